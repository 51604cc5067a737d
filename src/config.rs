//! Configuration for the grievance portal
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Origins the deployed frontends are served from
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,\
https://citizen-grivance-system.vercel.app,\
https://citizen-grivance-system.onrender.com,\
https://citizen-grivevance-system.vercel.app,\
https://main.d3o0le9zmytcdz.amplifyapp.com,\
https://main.d3x5934421hvg.amplifyapp.com";

/// Longest accepted session inactivity window (one day)
pub const MAX_SESSION_TTL_MINUTES: u64 = 24 * 60;

/// Secret used when running with `--dev-mode` and no SESSION_SECRET
const DEV_SESSION_SECRET: &str = "dev-only-insecure-session-secret";

/// Grievance portal backend
#[derive(Parser, Debug, Clone)]
#[command(name = "grievance-portal")]
#[command(about = "REST backend for the citizen grievance portal")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory stores, insecure cookies allowed)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGO_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "grievance_portal")]
    pub mongodb_db: String,

    /// Secret used to sign session cookies (required in production)
    #[arg(long, env = "SESSION_SECRET")]
    pub session_secret: Option<String>,

    /// Session inactivity timeout in minutes
    #[arg(long, env = "SESSION_TTL_MINUTES", default_value = "20")]
    pub session_ttl_minutes: u64,

    /// Mark the session cookie `Secure` (disable only for plain-http local testing)
    #[arg(long, env = "COOKIE_SECURE", default_value = "true", action = clap::ArgAction::Set)]
    pub cookie_secure: bool,

    /// Comma-separated list of origins allowed to call the API with credentials
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = DEFAULT_ALLOWED_ORIGINS)]
    pub allowed_origins: String,

    /// Directory evidence files are written to
    #[arg(long, env = "EVIDENCE_DIR", default_value = "./evidence")]
    pub evidence_dir: PathBuf,

    /// Maximum size of a single uploaded file in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: usize,

    /// Email of an admin account to seed at startup
    #[arg(long, env = "ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    /// Password of the seeded admin account
    #[arg(long, env = "ADMIN_PASSWORD")]
    pub admin_password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    /// Parsed allow-list of CORS origins
    pub fn allowed_origin_list(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Effective session secret (falls back to a fixed value in dev mode)
    pub fn effective_session_secret(&self) -> Option<String> {
        match &self.session_secret {
            Some(secret) => Some(secret.clone()),
            None if self.dev_mode => Some(DEV_SESSION_SECRET.to_string()),
            None => None,
        }
    }

    /// Session inactivity window
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_minutes.saturating_mul(60))
    }

    /// Upper bound on a whole request body (one file plus form fields)
    pub fn max_body_bytes(&self) -> usize {
        self.max_upload_bytes.saturating_add(64 * 1024)
    }

    /// Credentials for the seeded admin, when both halves are configured
    pub fn admin_seed(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email.as_str(), password.as_str()))
            }
            _ => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.session_secret {
                None => return Err("SESSION_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < 16 => {
                    return Err("SESSION_SECRET must be at least 16 characters".to_string())
                }
                Some(_) => {}
            }
        }

        if self.session_ttl_minutes == 0 {
            return Err("SESSION_TTL_MINUTES must be greater than zero".to_string());
        }

        if self.session_ttl_minutes > MAX_SESSION_TTL_MINUTES {
            return Err(format!(
                "SESSION_TTL_MINUTES must be at most {}",
                MAX_SESSION_TTL_MINUTES
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["grievance-portal"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults_follow_deployment() {
        let args = parse(&["--dev-mode"]);
        assert_eq!(args.session_ttl_minutes, 20);
        assert_eq!(args.session_ttl(), Duration::from_secs(1200));
        assert!(args
            .allowed_origin_list()
            .contains(&"http://localhost:3000".to_string()));
        assert_eq!(args.allowed_origin_list().len(), 6);
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&[]);
        if args.session_secret.is_none() {
            assert!(args.validate().is_err());
            assert!(args.effective_session_secret().is_none());
        }

        let args = parse(&["--session-secret", "a-long-enough-secret-value"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_dev_mode_has_fallback_secret() {
        let args = parse(&["--dev-mode"]);
        assert!(args.effective_session_secret().is_some());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let args = parse(&["--dev-mode", "--session-ttl-minutes", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_ttl_upper_bound() {
        let args = parse(&["--dev-mode", "--session-ttl-minutes", "1440"]);
        assert!(args.validate().is_ok());

        let args = parse(&["--dev-mode", "--session-ttl-minutes", "1441"]);
        assert!(args.validate().is_err());

        let args = parse(&["--dev-mode", "--session-ttl-minutes", &u64::MAX.to_string()]);
        assert!(args.validate().is_err());
        assert_eq!(args.session_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_origin_list_trims_trailing_slash() {
        let args = parse(&[
            "--dev-mode",
            "--allowed-origins",
            "https://a.example/, https://b.example",
        ]);
        assert_eq!(
            args.allowed_origin_list(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_admin_seed_needs_both_halves() {
        let args = parse(&["--dev-mode", "--admin-email", "root@city.gov"]);
        if args.admin_password.is_none() {
            assert!(args.admin_seed().is_none());
        }
        let args = parse(&[
            "--dev-mode",
            "--admin-email",
            "root@city.gov",
            "--admin-password",
            "hunter22",
        ]);
        assert_eq!(args.admin_seed(), Some(("root@city.gov", "hunter22")));
    }
}
