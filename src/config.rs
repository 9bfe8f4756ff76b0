use crate::domain::models::CohortType;
use base64::{engine::general_purpose, Engine as _};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Discord role id per cohort track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CohortRoleMap(HashMap<CohortType, String>);

impl CohortRoleMap {
    pub fn new(entries: impl IntoIterator<Item = (CohortType, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn role_for(&self, cohort_type: CohortType) -> Option<&str> {
        self.0.get(&cohort_type).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub api_base_url: String,
    pub bot_token: String,
    pub guild_id: String,
    pub cohort_roles: CohortRoleMap,
}

#[derive(Debug, Clone)]
pub struct TaskProcessorConfig {
    /// Six-field cron expression, seconds first.
    pub poll_cron: String,
    pub batch_size: i64,
    pub backoff_unit: Duration,
}

impl Default for TaskProcessorConfig {
    fn default() -> Self {
        Self {
            poll_cron: "*/10 * * * * *".to_string(),
            batch_size: 10,
            backoff_unit: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: String,
    pub session_key: Vec<u8>,
    pub discord: DiscordConfig,
    pub tasks: TaskProcessorConfig,
}

fn role_var(cohort_type: CohortType) -> &'static str {
    match cohort_type {
        CohortType::MasteringBitcoin => "DISCORD_ROLE_MASTERING_BITCOIN",
        CohortType::LearningBitcoinFromCommandLine => "DISCORD_ROLE_LEARNING_BITCOIN_FROM_COMMAND_LINE",
        CohortType::ProgrammingBitcoin => "DISCORD_ROLE_PROGRAMMING_BITCOIN",
        CohortType::BitcoinProtocolDevelopment => "DISCORD_ROLE_BITCOIN_PROTOCOL_DEVELOPMENT",
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn is_snowflake(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let database_url = require("DATABASE_URL")?;
        let max_connections = parse_number("DATABASE_MAX_CONNECTIONS", lookup("DATABASE_MAX_CONNECTIONS"), 10u32)?;

        let bind_addr = match lookup("BIND_ADDR") {
            Some(addr) => addr,
            None => {
                let port = parse_number("PORT", lookup("PORT"), 3000u16)?;
                format!("0.0.0.0:{}", port)
            }
        };

        let session_key = general_purpose::STANDARD
            .decode(require("SESSION_KEY")?)
            .map_err(|e| ConfigError::Invalid {
                name: "SESSION_KEY",
                reason: format!("must be base64 ({e})"),
            })?;

        let guild_id = require("DISCORD_GUILD_ID")?;
        if !is_snowflake(&guild_id) {
            return Err(ConfigError::Invalid {
                name: "DISCORD_GUILD_ID",
                reason: "must be numeric".to_string(),
            });
        }

        let mut roles = Vec::new();
        for cohort_type in CohortType::ALL {
            let name = role_var(cohort_type);
            let role_id = require(name)?;
            if !is_snowflake(&role_id) {
                return Err(ConfigError::Invalid {
                    name,
                    reason: "must be numeric".to_string(),
                });
            }
            roles.push((cohort_type, role_id));
        }

        let discord = DiscordConfig {
            api_base_url: lookup("DISCORD_API_BASE_URL")
                .unwrap_or_else(|| "https://discord.com/api/v10".to_string()),
            bot_token: require("DISCORD_BOT_TOKEN")?,
            guild_id,
            cohort_roles: CohortRoleMap::new(roles),
        };

        let defaults = TaskProcessorConfig::default();
        let batch_size = parse_number("TASK_BATCH_SIZE", lookup("TASK_BATCH_SIZE"), defaults.batch_size)?;
        if batch_size < 1 {
            return Err(ConfigError::Invalid {
                name: "TASK_BATCH_SIZE",
                reason: "must be positive".to_string(),
            });
        }
        let backoff_secs = parse_number(
            "TASK_BACKOFF_SECONDS",
            lookup("TASK_BACKOFF_SECONDS"),
            defaults.backoff_unit.as_secs(),
        )?;
        let tasks = TaskProcessorConfig {
            poll_cron: lookup("TASK_POLL_CRON").unwrap_or(defaults.poll_cron),
            batch_size,
            backoff_unit: Duration::from_secs(backoff_secs),
        };

        Ok(Self {
            database_url,
            max_connections,
            bind_addr,
            session_key,
            discord,
            tasks,
        })
    }
}
