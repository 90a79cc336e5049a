use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub security: SecurityConfig,
    pub blob: BlobConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Role that automatically receives full grants on every new page
    pub admin_role_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Directory uploaded files are written under
    pub root_dir: String,
    /// Base URL prefix for served files, e.g. "http://localhost:5000/uploads"
    pub public_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        Self {
            environment,
            security: SecurityConfig {
                jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
                jwt_expiry_hours: 24,
                admin_role_name: "Administrator".to_string(),
            },
            blob: BlobConfig {
                root_dir: "uploads".to_string(),
                public_base_url: "http://localhost:5000/uploads".to_string(),
            },
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("ADMIN_ROLE_NAME") {
            if !v.trim().is_empty() {
                self.security.admin_role_name = v;
            }
        }
        if let Ok(v) = env::var("BLOB_ROOT_DIR") {
            self.blob.root_dir = v;
        }
        if let Ok(v) = env::var("BLOB_PUBLIC_BASE_URL") {
            self.blob.public_base_url = v.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Global configuration instance, loaded once on first access
static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_development() {
        let config = AppConfig::from_env();
        // APP_ENV is unset in test runs
        if std::env::var("APP_ENV").is_err() {
            assert_eq!(config.environment, Environment::Development);
        }
        assert_eq!(config.security.admin_role_name, "Administrator");
    }
}
