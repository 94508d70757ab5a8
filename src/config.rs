use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub backend_base_url: String,
    pub backend_api_token: Option<String>,
    pub request_timeout: Duration,
    pub walk_concurrency: usize,
    pub public_rps: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let backend_base_url = get_env("BACKEND_BASE_URL")?;
        url::Url::parse(&backend_base_url)
            .map_err(|e| Error::Config(format!("Invalid value for BACKEND_BASE_URL: {}", e)))?;

        let walk_concurrency: usize = get_env_parse_or("WALK_CONCURRENCY", 4)?;
        if walk_concurrency == 0 {
            return Err(Error::Config(
                "WALK_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            backend_base_url: backend_base_url.trim_end_matches('/').to_string(),
            backend_api_token: env::var("BACKEND_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            request_timeout: Duration::from_secs(get_env_parse_or("REQUEST_TIMEOUT_SECS", 15)?),
            walk_concurrency,
            public_rps: get_env_parse_or("PUBLIC_RPS", 50)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
