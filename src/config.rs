//! Server configuration from command-line flags and the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::api::SecurityConfig;
use crate::db::Database;

/// Where the SQLite database lives.
#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file [default: <data dir>/cohort.db]
    #[arg(long = "database", env = "COHORT_DATABASE")]
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Open the configured database and bring its schema up to date.
    pub fn open(&self) -> anyhow::Result<Database> {
        let db = match &self.path {
            Some(path) => Database::open(path.clone())?,
            None => Database::open_default()?,
        };
        db.migrate().context("Failed to run database migrations")?;
        Ok(db)
    }
}

/// Settings for the HTTP server.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Port for the HTTP API
    #[arg(short, long, env = "COHORT_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "COHORT_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Bearer token required on every API route except /health
    #[arg(long, env = "COHORT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Comma-separated list of allowed CORS origins
    #[arg(long, env = "COHORT_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

impl ServeConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn security(&self) -> SecurityConfig {
        let cors_origins: Vec<String> = self
            .cors_origins
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        SecurityConfig {
            api_key: self.api_key.clone().filter(|k| !k.is_empty()),
            cors_origins: (!cors_origins.is_empty()).then_some(cors_origins),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            database: DatabaseConfig::default(),
            api_key: None,
            cors_origins: Vec::new(),
        }
    }
}
