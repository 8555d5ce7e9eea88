use anyhow::{anyhow, Error};
use std::env;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
}

impl Config {
    /// Reads the process configuration from the environment, loading a
    /// `.env` file first when one exists. `DATABASE_URL` is the only
    /// required variable; without it startup must abort.
    pub fn load() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_env()
    }

    fn from_env() -> Result<Self, Error> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow!("DATABASE_URL is not set"))?;

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| anyhow!("invalid PORT value {:?}: {}", raw, e))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self { database_url, port })
    }
}
