use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Redirect;
use catalog::models::users::User;
use tower_sessions::Session;

pub const USER_ID_KEY: &str = "user_id";
pub const USERNAME_KEY: &str = "username";

/// The authenticated identity carried by the request's session, passed
/// explicitly into every protected handler.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
}

/// Binds the session to the given account after login or registration.
pub async fn establish(
    session: &Session,
    user: &User,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(USER_ID_KEY, user.id).await?;
    session.insert(USERNAME_KEY, &user.username).await?;

    Ok(())
}

// The session gate: extracting a CurrentUser either yields the logged-in
// identity or rejects with a redirect to the login page, so the handler
// body never runs for unauthenticated requests.
#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| Redirect::to("/login"))?;

        let id = session.get::<i32>(USER_ID_KEY).await.ok().flatten();
        let username = session.get::<String>(USERNAME_KEY).await.ok().flatten();

        match (id, username) {
            (Some(id), Some(username)) => Ok(CurrentUser { id, username }),
            _ => Err(Redirect::to("/login")),
        }
    }
}
