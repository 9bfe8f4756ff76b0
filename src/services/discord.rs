use crate::config::DiscordConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::time::{sleep, Duration};

const MAX_ATTEMPTS: u32 = 3;

#[async_trait]
pub trait RoleAssigner: Send + Sync {
    async fn attach_role_to_member(&self, discord_user_id: &str, role_id: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
pub struct GuildMemberResponse {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Bot-authenticated client for the guild endpoints.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: String,
    guild_id: String,
}

/// Only idempotent reads are replayed after a rate limit.
fn should_retry(method: &Method, status: StatusCode, attempt: u32) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS && *method == Method::GET && attempt < MAX_ATTEMPTS
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            guild_id: config.guild_id.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    async fn execute(&self, method: Method, path: &str) -> Result<reqwest::Response> {
        let url = self.url(path);
        let mut attempt = 1;
        loop {
            let resp = self
                .http
                .request(method.clone(), &url)
                .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.bot_token))
                .header(reqwest::header::CONTENT_LENGTH, 0)
                .send()
                .await?;

            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }

            if should_retry(&method, status, attempt) {
                tracing::warn!("Discord rate limited {} {}, retrying (attempt {})", method, path, attempt);
                sleep(Duration::from_millis(1000 * attempt as u64)).await;
                attempt += 1;
                continue;
            }

            let body = resp.text().await.unwrap_or_default();
            tracing::error!(
                "Request to Discord failed! URL: {} Status code {} Reason {}",
                url,
                status,
                body
            );
            return Err(anyhow!("Discord API error {}: {}", status, body));
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.execute(Method::GET, path).await?;
        Ok(resp.json::<T>().await?)
    }

    pub async fn get_guild_member(&self, discord_user_id: &str) -> Result<GuildMemberResponse> {
        self.get_json(&format!("/guilds/{}/members/{}", self.guild_id, discord_user_id))
            .await
    }
}

#[async_trait]
impl RoleAssigner for DiscordClient {
    async fn attach_role_to_member(&self, discord_user_id: &str, role_id: &str) -> Result<()> {
        let member = self.get_guild_member(discord_user_id).await?;
        if member.roles.iter().any(|r| r == role_id) {
            tracing::debug!("Discord user {} already has role {}", discord_user_id, role_id);
            return Ok(());
        }

        self.execute(
            Method::PUT,
            &format!("/guilds/{}/members/{}/roles/{}", self.guild_id, discord_user_id, role_id),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CohortRoleMap;

    #[test]
    fn test_only_rate_limited_gets_retry() {
        assert!(should_retry(&Method::GET, StatusCode::TOO_MANY_REQUESTS, 1));
        assert!(should_retry(&Method::GET, StatusCode::TOO_MANY_REQUESTS, 2));
        assert!(!should_retry(&Method::GET, StatusCode::TOO_MANY_REQUESTS, 3));
        assert!(!should_retry(&Method::PUT, StatusCode::TOO_MANY_REQUESTS, 1));
        assert!(!should_retry(&Method::GET, StatusCode::INTERNAL_SERVER_ERROR, 1));
    }

    #[test]
    fn test_urls_are_joined_without_double_slash() {
        let client = DiscordClient::new(&DiscordConfig {
            api_base_url: "https://discord.com/api/v10/".into(),
            bot_token: "token".into(),
            guild_id: "1".into(),
            cohort_roles: CohortRoleMap::default(),
        });
        assert_eq!(client.url("/guilds/1/members/2"), "https://discord.com/api/v10/guilds/1/members/2");
    }

    #[test]
    fn test_member_response_tolerates_missing_roles() {
        let member: GuildMemberResponse = serde_json::from_str(r#"{"nick": null, "joined_at": "2024-01-01T00:00:00Z"}"#).unwrap();
        assert!(member.roles.is_empty());
    }
}
