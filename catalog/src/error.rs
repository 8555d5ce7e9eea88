// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use thiserror::Error as DError;

/// Recoverable catalog failures. The display strings are shown to the
/// user verbatim, so they must not reveal more than the page should.
#[derive(Debug, Clone, Eq, PartialEq, DError)]
pub enum ErrorKind {
    #[error("Username and password are required.")]
    MissingCredentials,

    #[error("That username is already taken.")]
    UsernameTaken,

    // One message for unknown user and wrong password alike
    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("No book with ISBN {0} exists in the catalog.")]
    UnknownBook(String),

    #[error("Please enter 1\u{2013}5 stars and a comment.")]
    InvalidReview,
}
