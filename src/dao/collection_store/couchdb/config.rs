use std::env;

use super::error::{CouchDaoError, CouchResult};

/// Database used when `COUCH_DB` is unset.
const DEFAULT_DATABASE: &str = "lunch_roulette";

/// Where the CouchDB collections live and how to authenticate.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CouchConfig {
    /// Read `COUCH_BASE_URL` (required), `COUCH_DB` and the optional
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = env::var("COUCH_DB").unwrap_or_else(|_| DEFAULT_DATABASE.to_owned());

        // Credentials only count when both halves are present.
        let (username, password) = env::var("COUCH_USERNAME")
            .ok()
            .zip(env::var("COUCH_PASSWORD").ok())
            .unzip();

        Ok(Self {
            base_url,
            database,
            username,
            password,
        })
    }
}
