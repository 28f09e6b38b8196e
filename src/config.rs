use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub conference: ConferenceConfig,
    pub statistics: StatisticsConfig,
    pub users: UserDirectoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite:...` URL, or `memory` for the in-process store
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCredential {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Allow-list checked before any network call
    pub admin_credentials: Vec<AdminCredential>,
    /// Base URL of the external auth API (`POST {base}/auth/login`)
    pub api_base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferenceConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    pub cache_capacity: usize,
    pub online_window_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDirectoryConfig {
    pub debounce_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let admin_credentials = match env::var("ADMIN_CREDENTIALS") {
            Ok(raw) => parse_admin_credentials(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/conference_admin.db".to_string()),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            auth: AuthConfig {
                admin_credentials,
                api_base_url: env::var("AUTH_API_URL").ok().filter(|url| !url.trim().is_empty()),
                timeout_secs: env::var("AUTH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            conference: ConferenceConfig {
                name: env::var("CONFERENCE_NAME").unwrap_or_else(|_| "RIF 2025".to_string()),
            },
            statistics: StatisticsConfig {
                cache_capacity: env::var("STATS_CACHE_CAPACITY")
                    .unwrap_or_else(|_| "16".to_string())
                    .parse()
                    .unwrap_or(16),
                online_window_minutes: env::var("ONLINE_WINDOW_MINUTES")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            users: UserDirectoryConfig {
                debounce_ms: env::var("USER_DIRECTORY_DEBOUNCE_MS")
                    .unwrap_or_else(|_| "250".to_string())
                    .parse()
                    .unwrap_or(250),
            },
        })
    }

    /// Configuration used by tests and the sample-data binary: in-memory store,
    /// no external auth endpoint.
    pub fn for_memory_store(admin_credentials: Vec<AdminCredential>) -> Self {
        Self {
            database: DatabaseConfig {
                url: "memory".to_string(),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            auth: AuthConfig {
                admin_credentials,
                api_base_url: None,
                timeout_secs: 10,
            },
            conference: ConferenceConfig {
                name: "RIF 2025".to_string(),
            },
            statistics: StatisticsConfig {
                cache_capacity: 16,
                online_window_minutes: 10,
            },
            users: UserDirectoryConfig { debounce_ms: 10 },
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Parses `email:password,email:password`. The password may itself contain `:`.
fn parse_admin_credentials(raw: &str) -> anyhow::Result<Vec<AdminCredential>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (email, password) = entry
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("ADMIN_CREDENTIALS entry '{}' is missing ':'", entry))?;
            if email.is_empty() || password.is_empty() {
                anyhow::bail!("ADMIN_CREDENTIALS entry '{}' has an empty email or password", entry);
            }
            Ok(AdminCredential {
                email: email.to_string(),
                password: password.to_string(),
            })
        })
        .collect()
}
