use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent is tolerated: the server starts and product endpoints fail.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .unwrap_or_else(|| "5001".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|| "20".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        })
    }
}
