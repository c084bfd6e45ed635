use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
}

fn default_access_ttl() -> i64 {
    900 // 15 minutes
}

fn default_refresh_ttl() -> i64 {
    604_800 // 7 days
}

/// Auth configuration. Access and refresh tokens are signed with distinct
/// secrets; a token of one kind never verifies under the other's secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    /// Access token TTL in seconds (default: 15 minutes)
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    /// Refresh token TTL in seconds (default: 7 days)
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
    /// Set the Secure attribute on session cookies (enable in production)
    #[serde(default)]
    pub cookie_secure: bool,
}

/// Server configuration - loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: String, // "0.0.0.0:8080"
    pub db: DbConfig,
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Load configuration from the file named by `OPGAVE_CONFIG`
    /// (default: `server-config.yaml`)
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("OPGAVE_CONFIG").unwrap_or_else(|_| "server-config.yaml".to_string());
        Self::from_file(&path)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: ServerConfig = serde_yml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config_applies_defaults() {
        let yaml = r#"
listen: "127.0.0.1:8080"
db:
  url: "postgres://localhost/opgave"
auth:
  access_secret: "a-secret"
  refresh_secret: "r-secret"
"#;
        let config: ServerConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.listen, "127.0.0.1:8080");
        assert_eq!(config.auth.access_ttl_secs, 900);
        assert_eq!(config.auth.refresh_ttl_secs, 604_800);
        assert!(!config.auth.cookie_secure);
    }

    #[test]
    fn test_parse_overridden_ttls() {
        let yaml = r#"
listen: "0.0.0.0:8080"
db:
  url: "postgres://localhost/opgave"
auth:
  access_secret: "a"
  refresh_secret: "r"
  access_ttl_secs: 60
  refresh_ttl_secs: 3600
  cookie_secure: true
"#;
        let config: ServerConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.auth.access_ttl_secs, 60);
        assert_eq!(config.auth.refresh_ttl_secs, 3600);
        assert!(config.auth.cookie_secure);
    }
}
