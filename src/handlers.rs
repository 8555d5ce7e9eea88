// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::pages::Pages;
use crate::session::{establish, CurrentUser};
use crate::App;
use anyhow::{anyhow, Error};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use catalog::error::ErrorKind;
use catalog::SearchOutcome;
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    rating: String,
    #[serde(default)]
    review_text: String,
}

/// Runs synchronous catalog work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(anyhow!("catalog task failed: {}", e)),
    }
}

fn internal_error(e: Error) -> Response {
    log::error!("request failed: {:#}", e);

    Pages::server_error()
}

// A missing rating and a malformed one are the same case: the parse
// falls back to 0, which the range check then rejects.
fn parse_rating(raw: &str) -> i16 {
    raw.trim().parse().unwrap_or(0)
}

pub async fn index(State(app): State<App>, user: CurrentUser) -> Response {
    app.pages.search_form(&user.username)
}

pub async fn search(
    State(app): State<App>,
    user: CurrentUser,
    Form(form): Form<SearchForm>,
) -> Response {
    let catalog = app.catalog.clone();

    match blocking(move || catalog.search(&form.q)).await {
        Ok(SearchOutcome::EmptyQuery) => {
            app.pages.search_prompt(&user.username, "Please type something.")
        }
        Ok(SearchOutcome::Matches { query, books }) => {
            app.pages.search_results(&user.username, &query, &books)
        }
        Err(e) => internal_error(e),
    }
}

pub async fn register_page(State(app): State<App>) -> Response {
    app.pages.register(None)
}

pub async fn register(
    State(app): State<App>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let catalog = app.catalog.clone();
    let result = blocking(move || catalog.register(&form.username, &form.password)).await;

    match result {
        Ok(user) => match establish(&session, &user).await {
            Ok(()) => Redirect::to("/").into_response(),
            Err(e) => internal_error(anyhow!("failed to establish session: {}", e)),
        },
        Err(e) => match e.downcast_ref::<ErrorKind>().cloned() {
            Some(kind @ ErrorKind::MissingCredentials) | Some(kind @ ErrorKind::UsernameTaken) => {
                app.pages.register(Some(&kind.to_string()))
            }
            _ => internal_error(e),
        },
    }
}

/// A plain read of the login page always starts from a logged-out state.
pub async fn login_page(State(app): State<App>, session: Session) -> Response {
    if let Err(e) = session.flush().await {
        log::warn!("failed to clear session: {}", e);
    }

    app.pages.login(None)
}

pub async fn login(
    State(app): State<App>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let catalog = app.catalog.clone();
    let result = blocking(move || catalog.login(&form.username, &form.password)).await;

    match result {
        Ok(user) => match establish(&session, &user).await {
            Ok(()) => Redirect::to("/").into_response(),
            Err(e) => internal_error(anyhow!("failed to establish session: {}", e)),
        },
        Err(e) => match e.downcast_ref::<ErrorKind>().cloned() {
            Some(kind @ ErrorKind::InvalidCredentials) => {
                app.pages.login(Some(&kind.to_string()))
            }
            _ => internal_error(e),
        },
    }
}

pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = session.flush().await {
        log::warn!("failed to clear session: {}", e);
    }

    Redirect::to("/login")
}

pub async fn book_page(
    State(app): State<App>,
    user: CurrentUser,
    Path(isbn): Path<String>,
) -> Response {
    render_detail(&app, &user, &isbn, None).await
}

pub async fn submit_review(
    State(app): State<App>,
    user: CurrentUser,
    Path(isbn): Path<String>,
    Form(form): Form<ReviewForm>,
) -> Response {
    let rating = parse_rating(&form.rating);
    let catalog = app.catalog.clone();
    let db_isbn = isbn.clone();
    let user_id = user.id;
    let result =
        blocking(move || catalog.submit_review(user_id, &db_isbn, rating, &form.review_text)).await;

    match result {
        // Redirect back to the detail page so a refresh can't resubmit
        Ok(_) => Redirect::to(&format!("/book/{}", isbn)).into_response(),
        Err(e) => match e.downcast_ref::<ErrorKind>().cloned() {
            Some(ErrorKind::UnknownBook(_)) => app.pages.book_missing(&user.username),
            Some(kind @ ErrorKind::InvalidReview) => {
                render_detail(&app, &user, &isbn, Some(&kind.to_string())).await
            }
            _ => internal_error(e),
        },
    }
}

async fn render_detail(
    app: &App,
    user: &CurrentUser,
    isbn: &str,
    message: Option<&str>,
) -> Response {
    let catalog = app.catalog.clone();
    let db_isbn = isbn.to_string();

    match blocking(move || catalog.book_detail(&db_isbn)).await {
        Ok(detail) => app.pages.book(&user.username, &detail, message),
        Err(e) => match e.downcast_ref::<ErrorKind>().cloned() {
            Some(ErrorKind::UnknownBook(_)) => app.pages.book_missing(&user.username),
            _ => internal_error(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_ratings_fall_back_to_the_sentinel() {
        assert_eq!(parse_rating("abc"), 0);
        assert_eq!(parse_rating(""), 0);
        assert_eq!(parse_rating("4.5"), 0);
        assert_eq!(parse_rating("-2"), -2);
    }

    #[test]
    fn well_formed_ratings_parse() {
        assert_eq!(parse_rating("3"), 3);
        assert_eq!(parse_rating(" 5 "), 5);
    }

    #[test]
    fn sentinel_and_out_of_range_fail_the_same_way() {
        let sentinel = catalog::validate_review(parse_rating("abc"), "fine").unwrap_err();
        let out_of_range = catalog::validate_review(6, "fine").unwrap_err();

        assert_eq!(sentinel.to_string(), out_of_range.to_string());
    }
}
