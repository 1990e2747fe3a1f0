//! Configuration management for the attendance server

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub upstream: UpstreamConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    /// Bootstrap servers, comma separated.
    pub brokers: String,
    pub group_id: String,
}

/// GraphQL endpoints of the services that own the replicated entities.
/// Concerts and rehearsals are both owned by the planning service.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub members_url: String,
    pub planning_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Bounded wait for a single broker poll.
    pub poll_timeout_secs: u64,
    /// Sleep between polls when the broker had nothing for us.
    pub idle_backoff_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./attendance.db".to_string(),
            },
            kafka: KafkaConfig {
                brokers: "localhost:9092".to_string(),
                group_id: "attendance-service".to_string(),
            },
            upstream: UpstreamConfig {
                members_url: "http://localhost:8081/graphql".to_string(),
                planning_url: "http://localhost:8082/graphql".to_string(),
            },
            sync: SyncConfig {
                poll_timeout_secs: 1,
                idle_backoff_secs: 10,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./attendance.db".to_string()),
            },
            kafka: KafkaConfig {
                brokers: env::var("KAFKA_URL")?,
                group_id: env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| "attendance-service".to_string()),
            },
            upstream: UpstreamConfig {
                members_url: env::var("MEMBERS_GRAPHQL_URL")?,
                planning_url: env::var("PLANNING_GRAPHQL_URL")?,
            },
            sync: SyncConfig {
                poll_timeout_secs: env::var("SYNC_POLL_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .unwrap_or(1),
                idle_backoff_secs: env::var("SYNC_IDLE_BACKOFF_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
        })
    }
}
