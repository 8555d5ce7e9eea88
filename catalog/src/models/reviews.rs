// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use super::books::Book;
use super::users::User;
use crate::schema::reviews;
use chrono::{DateTime, Utc};

// To query data from the database
#[derive(Debug, Clone, Identifiable, Queryable, Associations)]
#[belongs_to(User)]
#[belongs_to(Book, foreign_key = "isbn")]
pub struct Review {
    pub id: i32,
    pub user_id: i32,
    pub isbn: String,
    pub rating: i16,
    pub review_text: String,
    pub created_at: DateTime<Utc>,
}

// To insert a new review into the database
#[derive(Debug, Clone, Insertable)]
#[table_name = "reviews"]
pub struct NewReview<'a> {
    pub user_id: i32,
    pub isbn: &'a str,
    pub rating: i16,
    pub review_text: &'a str,
    pub created_at: DateTime<Utc>,
}

/// A review joined with its author's username, as shown on the book page.
#[derive(Debug, Clone)]
pub struct ReviewWithAuthor {
    pub username: String,
    pub rating: i16,
    pub review_text: String,
    pub created_at: DateTime<Utc>,
}
