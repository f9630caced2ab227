//! Configuration for Chainhub
//!
//! CLI arguments with environment variable fallbacks, using clap.

use clap::Parser;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Chainhub - link-in-bio pages with owner-only editing
#[derive(Parser, Clone)]
#[command(name = "chainhub")]
#[command(about = "Link-in-bio API server")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Deployment environment (development, production)
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub app_env: String,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "chainhub.db")]
    pub database_path: PathBuf,

    /// Shared secret for signing session tokens (required)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Apply pending schema migrations at startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true", action = clap::ArgAction::Set)]
    pub run_migrations: bool,

    /// Origin allowed by CORS
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Deadline for each request's store work, in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "5000")]
    pub request_timeout_ms: u64,

    /// Attempts to open the database before giving up
    #[arg(long, env = "DB_CONNECT_ATTEMPTS", default_value = "10")]
    pub db_connect_attempts: u32,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        match self.jwt_secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => {}
            _ => return Err("JWT_SECRET is required and must not be empty".to_string()),
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.db_connect_attempts == 0 {
            return Err("DB_CONNECT_ATTEMPTS must be at least 1".to_string());
        }

        Ok(())
    }

    /// Signing secret, empty when unset (rejected by [`Args::validate`])
    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}

// Hand-written so the secret never reaches a log line
impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("listen", &self.listen)
            .field("app_env", &self.app_env)
            .field("database_path", &self.database_path)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("run_migrations", &self.run_migrations)
            .field("frontend_url", &self.frontend_url)
            .field("log_level", &self.log_level)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("db_connect_attempts", &self.db_connect_attempts)
            .finish()
    }
}
