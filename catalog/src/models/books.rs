use crate::schema::books;
use serde::Serialize;

// To query data from the database
#[derive(Debug, Clone, Identifiable, Queryable, Serialize)]
#[primary_key(isbn)]
pub struct Book {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub year: i16,
}
