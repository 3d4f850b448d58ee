//! Configuration for caselog
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Caselog - activity trail service for an insurance-agency CRM
#[derive(Parser, Debug, Clone)]
#[command(name = "caselog")]
#[command(about = "Activity trail service for an insurance-agency CRM")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "caselog")]
    pub mongodb_db: String,

    /// JWT secret for token verification (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds (used when minting dev tokens)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Enable development mode (insecure default JWT secret, MongoDB optional)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if let Some(ref secret) = self.jwt_secret {
            if !self.dev_mode && secret.len() < 32 {
                return Err("JWT_SECRET must be at least 32 characters".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["caselog"])
    }

    #[test]
    fn dev_mode_allows_missing_secret() {
        let mut args = base_args();
        args.dev_mode = true;
        args.jwt_secret = None;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn production_requires_secret() {
        let mut args = base_args();
        args.dev_mode = false;
        args.jwt_secret = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn production_rejects_short_secret() {
        let mut args = base_args();
        args.dev_mode = false;
        args.jwt_secret = Some("short".into());
        assert!(args.validate().is_err());
    }
}
