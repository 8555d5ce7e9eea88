// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use anyhow::Error;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use catalog::models::books::Book;
use catalog::BookDetail;
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Renders a 1-to-5 rating as star glyphs.
pub fn stars(rating: i16) -> String {
    let filled = rating.max(0).min(5) as usize;

    "★".repeat(filled) + &"☆".repeat(5 - filled)
}

#[derive(Serialize)]
struct ReviewView {
    username: String,
    stars: String,
    text: String,
    posted: String,
}

/// The compiled template registry. Every value interpolated into a page
/// goes through handlebars' default HTML escaping; review text and search
/// queries are untrusted input and must never reach the browser as markup.
#[derive(Clone)]
pub struct Pages {
    registry: Arc<Handlebars<'static>>,
}

impl Pages {
    pub fn new() -> Result<Self, Error> {
        let mut registry = Handlebars::new();

        registry.register_template_string("layout", include_str!("../templates/layout.hbs"))?;
        registry.register_template_string("index", include_str!("../templates/index.hbs"))?;
        registry.register_template_string("login", include_str!("../templates/login.hbs"))?;
        registry.register_template_string("register", include_str!("../templates/register.hbs"))?;
        registry.register_template_string("book", include_str!("../templates/book.hbs"))?;
        registry.register_template_string(
            "book_missing",
            include_str!("../templates/book_missing.hbs"),
        )?;

        Ok(Self {
            registry: Arc::new(registry),
        })
    }

    fn render_string(&self, template: &str, data: &Value) -> Result<String, Error> {
        Ok(self.registry.render(template, data)?)
    }

    fn render(&self, template: &str, data: Value) -> Response {
        match self.render_string(template, &data) {
            Ok(body) => Html(body).into_response(),
            Err(e) => {
                log::error!("failed to render the {} page: {}", template, e);
                Self::server_error()
            }
        }
    }

    pub fn search_form(&self, username: &str) -> Response {
        self.render(
            "index",
            json!({ "title": "Search", "user": username, "searched": false }),
        )
    }

    pub fn search_prompt(&self, username: &str, message: &str) -> Response {
        self.render(
            "index",
            json!({
                "title": "Search",
                "user": username,
                "searched": false,
                "message": message,
            }),
        )
    }

    pub fn search_results(&self, username: &str, query: &str, books: &[Book]) -> Response {
        self.render(
            "index",
            json!({
                "title": "Results",
                "user": username,
                "searched": true,
                "query": query,
                "results": books,
            }),
        )
    }

    pub fn login(&self, message: Option<&str>) -> Response {
        self.render("login", json!({ "title": "Login", "message": message }))
    }

    pub fn register(&self, message: Option<&str>) -> Response {
        self.render(
            "register",
            json!({ "title": "Register", "message": message }),
        )
    }

    pub fn book(&self, username: &str, detail: &BookDetail, message: Option<&str>) -> Response {
        self.render("book", book_data(username, detail, message))
    }

    pub fn book_missing(&self, username: &str) -> Response {
        self.render("book_missing", json!({ "title": "Book", "user": username }))
    }

    pub fn server_error() -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h2>Something went wrong</h2><p>Please try again.</p>"),
        )
            .into_response()
    }
}

fn book_data(username: &str, detail: &BookDetail, message: Option<&str>) -> Value {
    let reviews: Vec<ReviewView> = detail
        .reviews
        .iter()
        .map(|review| ReviewView {
            username: review.username.clone(),
            stars: stars(review.rating),
            text: review.review_text.clone(),
            posted: review.created_at.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();

    json!({
        "title": "Book",
        "user": username,
        "book": &detail.book,
        "count": detail.aggregate.count,
        "average": format!("{:.2}", detail.aggregate.average),
        "reviews": reviews,
        "message": message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::models::reviews::ReviewWithAuthor;
    use catalog::Aggregate;
    use chrono::Utc;

    fn sample_detail(review_text: &str) -> BookDetail {
        BookDetail {
            book: Book {
                isbn: "1416949658".to_string(),
                title: "The Dark and Hollow Places".to_string(),
                author: "Carrie Ryan".to_string(),
                year: 2011,
            },
            reviews: vec![ReviewWithAuthor {
                username: "alice".to_string(),
                rating: 4,
                review_text: review_text.to_string(),
                created_at: Utc::now(),
            }],
            aggregate: Aggregate {
                count: 2,
                average: 4.0,
            },
        }
    }

    #[test]
    fn star_rendering() {
        assert_eq!(stars(1), "★☆☆☆☆");
        assert_eq!(stars(4), "★★★★☆");
        assert_eq!(stars(5), "★★★★★");
    }

    #[test]
    fn review_text_is_escaped() -> Result<(), Error> {
        let pages = Pages::new()?;
        let detail = sample_detail("<script>alert('gotcha')</script>");

        let body = pages.render_string("book", &book_data("alice", &detail, None))?;

        assert!(!body.contains("<script>alert"));
        assert!(body.contains("&lt;script&gt;"));

        Ok(())
    }

    #[test]
    fn book_page_shows_aggregate_and_stars() -> Result<(), Error> {
        let pages = Pages::new()?;
        let detail = sample_detail("A fine read.");

        let body = pages.render_string("book", &book_data("alice", &detail, None))?;

        assert!(body.contains("2 review(s), average 4.00/5"));
        assert!(body.contains("★★★★☆"));
        assert!(body.contains("A fine read."));

        Ok(())
    }

    #[test]
    fn navigation_follows_session_state() -> Result<(), Error> {
        let pages = Pages::new()?;

        let logged_in = pages.render_string(
            "index",
            &json!({ "title": "Search", "user": "alice", "searched": false }),
        )?;
        assert!(logged_in.contains("Logout"));
        assert!(logged_in.contains("alice"));

        let logged_out = pages.render_string("login", &json!({ "title": "Login" }))?;
        assert!(logged_out.contains("href=\"/register\""));
        assert!(!logged_out.contains("Logout"));

        Ok(())
    }

    #[test]
    fn results_link_to_book_pages() -> Result<(), Error> {
        let pages = Pages::new()?;
        let books = vec![Book {
            isbn: "0380795272".to_string(),
            title: "Krondor: The Betrayal".to_string(),
            author: "Raymond E. Feist".to_string(),
            year: 1998,
        }];

        let body = pages.render_string(
            "index",
            &json!({
                "title": "Results",
                "user": "alice",
                "searched": true,
                "query": "krondor",
                "results": books,
            }),
        )?;

        assert!(body.contains("href=\"/book/0380795272\""));
        assert!(body.contains("Krondor: The Betrayal"));

        Ok(())
    }

    #[test]
    fn empty_match_set_is_reported_for_the_query() -> Result<(), Error> {
        let pages = Pages::new()?;

        let body = pages.render_string(
            "index",
            &json!({
                "title": "Results",
                "user": "alice",
                "searched": true,
                "query": "nonexistent-xyz",
                "results": [],
            }),
        )?;

        assert!(body.contains("No matches for"));
        assert!(body.contains("nonexistent-xyz"));

        Ok(())
    }
}
