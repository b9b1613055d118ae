use std::env;

/// Process configuration, read entirely from the environment.
///
/// Grounded in `services/server/src/main.rs`'s use of `std::env::var` with
/// defaults for `BIND_ADDR`/`LOG_LEVEL`; no CLI argument parser is
/// introduced (out of scope per spec.md §1).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:1200".to_owned()),
            database_url: env::var("DATABASE_URL").ok(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
        }
    }
}
