// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

#[macro_use]
extern crate diesel;

pub mod error;
pub mod models;
pub mod schema;

use crate::models::books::Book;
use crate::models::reviews::{NewReview, Review, ReviewWithAuthor};
use crate::models::users::{NewUser, User};
use crate::schema::{books, reviews, users};
use anyhow::{anyhow, Error};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use diesel::pg::upsert::on_constraint;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{insert_into, prelude::*};
use error::ErrorKind;

pub type Result<T> = std::result::Result<T, Error>;

type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

/// Search results never exceed this many books.
pub const MAX_SEARCH_RESULTS: i64 = 50;

/// Outcome of a catalog search. An empty query is its own case, distinct
/// from a query that simply matched nothing.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    EmptyQuery,
    Matches { query: String, books: Vec<Book> },
}

/// Count and average derived from the current review rows of one book.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub count: usize,
    pub average: f64,
}

impl Aggregate {
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = i16>,
    {
        let mut count = 0;
        let mut total = 0i64;

        for score in scores {
            count += 1;
            total += i64::from(score);
        }

        let average = if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        };

        Self { count, average }
    }
}

/// Everything the book page needs: the book itself, its reviews joined
/// with reviewer usernames (newest first) and the derived aggregate.
#[derive(Debug, Clone)]
pub struct BookDetail {
    pub book: Book,
    pub reviews: Vec<ReviewWithAuthor>,
    pub aggregate: Aggregate,
}

pub(crate) fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn validate_review(rating: i16, text: &str) -> Result<&str> {
    let text = text.trim();

    if rating < 1 || rating > 5 || text.is_empty() {
        Err(ErrorKind::InvalidReview.into())
    } else {
        Ok(text)
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {}", e))?;

    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow!("stored password hash is malformed: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Clone)]
pub struct Catalog {
    pool: PgPool,
}

impl Catalog {
    pub fn new() -> Result<Self> {
        Self::connect("postgres://postgres:@localhost/bookshelf")
    }

    /// Builds the connection pool. The pool checks out a first connection
    /// eagerly, so an unreachable database fails here instead of on the
    /// first request.
    pub fn connect(database_url: &str) -> Result<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder().build(manager)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PgPooled> {
        Ok(self.pool.get()?)
    }

    /// Creates an account. The username must be unique (case-sensitive);
    /// both the pre-check and a lost insert race surface as `UsernameTaken`.
    pub fn register(&self, username: &str, password: &str) -> Result<User> {
        let username = username.trim();

        if username.is_empty() || password.trim().is_empty() {
            return Err(ErrorKind::MissingCredentials.into());
        }

        let conn = self.conn()?;

        let existing = users::table
            .filter(users::username.eq(username))
            .select(users::id)
            .first::<i32>(&*conn)
            .optional()?;

        if existing.is_some() {
            return Err(ErrorKind::UsernameTaken.into());
        }

        let password_hash = hash_password(password)?;
        let new_user = NewUser {
            username,
            password_hash: &password_hash,
        };

        let inserted = insert_into(users::table)
            .values(&new_user)
            .get_result::<User>(&*conn);

        match inserted {
            Ok(user) => Ok(user),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(ErrorKind::UsernameTaken.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verifies credentials. Unknown usernames and wrong passwords fail
    /// with the same `InvalidCredentials` error.
    pub fn login(&self, username: &str, password: &str) -> Result<User> {
        let conn = self.conn()?;

        let user = users::table
            .filter(users::username.eq(username.trim()))
            .first::<User>(&*conn)
            .optional()?;

        let user = match user {
            Some(user) => user,
            None => return Err(ErrorKind::InvalidCredentials.into()),
        };

        if verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(ErrorKind::InvalidCredentials.into())
        }
    }

    /// Case-insensitive substring search across isbn, title and author,
    /// ordered by title and capped at `MAX_SEARCH_RESULTS`.
    pub fn search(&self, query: &str) -> Result<SearchOutcome> {
        let query = match normalize_query(query) {
            Some(query) => query,
            None => return Ok(SearchOutcome::EmptyQuery),
        };

        let conn = self.conn()?;
        let pattern = format!("%{}%", query);

        let matched = books::table
            .filter(
                books::isbn
                    .ilike(pattern.as_str())
                    .or(books::title.ilike(pattern.as_str()))
                    .or(books::author.ilike(pattern.as_str())),
            )
            .order(books::title.asc())
            .limit(MAX_SEARCH_RESULTS)
            .load::<Book>(&*conn)?;

        Ok(SearchOutcome::Matches {
            query,
            books: matched,
        })
    }

    pub fn book_detail(&self, isbn: &str) -> Result<BookDetail> {
        let conn = self.conn()?;
        let book = self.find_book(&conn, isbn)?;

        let rows = reviews::table
            .inner_join(users::table)
            .filter(reviews::isbn.eq(isbn))
            .order(reviews::created_at.desc())
            .select((
                users::username,
                reviews::rating,
                reviews::review_text,
                reviews::created_at,
            ))
            .load::<(String, i16, String, DateTime<Utc>)>(&*conn)?;

        let aggregate = Aggregate::from_scores(rows.iter().map(|row| row.1));

        let reviews = rows
            .into_iter()
            .map(|(username, rating, review_text, created_at)| ReviewWithAuthor {
                username,
                rating,
                review_text,
                created_at,
            })
            .collect();

        Ok(BookDetail {
            book,
            reviews,
            aggregate,
        })
    }

    /// Writes the user's review for a book as one atomic upsert: a second
    /// submission by the same user overwrites rating, text and timestamp
    /// instead of adding a row.
    pub fn submit_review(
        &self,
        user_id: i32,
        isbn: &str,
        rating: i16,
        text: &str,
    ) -> Result<Review> {
        let text = validate_review(rating, text)?;

        let conn = self.conn()?;
        self.find_book(&conn, isbn)?;

        let now = Utc::now();
        let new_review = NewReview {
            user_id,
            isbn,
            rating,
            review_text: text,
            created_at: now,
        };

        Ok(insert_into(reviews::table)
            .values(&new_review)
            .on_conflict(on_constraint("reviews_user_id_isbn_key"))
            .do_update()
            .set((
                reviews::rating.eq(rating),
                reviews::review_text.eq(text),
                reviews::created_at.eq(now),
            ))
            .get_result(&*conn)?)
    }

    fn find_book(&self, conn: &PgPooled, isbn: &str) -> Result<Book> {
        let book = books::table
            .find(isbn)
            .first::<Book>(&**conn)
            .optional()?;

        book.ok_or_else(|| ErrorKind::UnknownBook(isbn.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_its_own_case() {
        assert_eq!(normalize_query(""), None);
        assert_eq!(normalize_query("   "), None);
        assert_eq!(normalize_query("  tolkien "), Some("tolkien".to_string()));
    }

    #[test]
    fn review_validation_accepts_exactly_one_to_five() {
        for rating in 1..=5 {
            assert!(validate_review(rating, "fine").is_ok());
        }

        for rating in &[0, 6, -1, 100] {
            let err = validate_review(*rating, "fine").unwrap_err();
            assert_eq!(
                err.downcast_ref::<ErrorKind>(),
                Some(&ErrorKind::InvalidReview)
            );
        }
    }

    #[test]
    fn review_validation_rejects_blank_text() {
        let err = validate_review(3, "   ").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ErrorKind>(),
            Some(&ErrorKind::InvalidReview)
        );
    }

    #[test]
    fn review_validation_trims_text() {
        assert_eq!(validate_review(4, "  loved it  ").unwrap(), "loved it");
    }

    #[test]
    fn bad_rating_and_bad_text_fail_with_one_message() {
        let from_rating = validate_review(0, "fine").unwrap_err();
        let from_text = validate_review(3, " ").unwrap_err();

        assert_eq!(from_rating.to_string(), from_text.to_string());
    }

    #[test]
    fn aggregate_averages_scores() {
        let aggregate = Aggregate::from_scores(vec![5, 3]);

        assert_eq!(aggregate.count, 2);
        assert!((aggregate.average - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn aggregate_of_nothing_is_zero() {
        let aggregate = Aggregate::from_scores(Vec::new());

        assert_eq!(aggregate.count, 0);
        assert!((aggregate.average - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn password_hashes_are_salted_and_verifiable() -> Result<()> {
        let first = hash_password("hunter2")?;
        let second = hash_password("hunter2")?;

        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first)?);
        assert!(!verify_password("hunter3", &first)?);

        Ok(())
    }
}
