mod handlers;
mod pages;
mod session;

use anyhow::Error;
use axum::routing::get;
use axum::Router;
use catalog::Catalog;
use config::Config;
use log::info;
use pages::Pages;
use simplelog::{LevelFilter, TermLogger, TerminalMode};
use tokio::net::TcpListener;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct App {
    pub catalog: Catalog,
    pub pages: Pages,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    TermLogger::init(
        LevelFilter::Info,
        simplelog::Config::default(),
        TerminalMode::Mixed,
    )?;

    info!("Starting bookshelf {}", VERSION);

    let config = Config::load()?;

    info!("Connecting to the database...");
    let catalog = Catalog::connect(&config.database_url)?;

    let app = App {
        catalog,
        pages: Pages::new()?,
    };

    // Sessions are held in memory and end with the browsing session;
    // nothing in them survives a restart.
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnSessionEnd);

    let router = Router::new()
        .route("/", get(handlers::index).post(handlers::search))
        .route(
            "/register",
            get(handlers::register_page).post(handlers::register),
        )
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/logout", get(handlers::logout))
        .route(
            "/book/:isbn",
            get(handlers::book_page).post(handlers::submit_review),
        )
        .layer(session_layer)
        .with_state(app);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on {}", address);

    axum::serve(listener, router).await?;

    Ok(())
}
