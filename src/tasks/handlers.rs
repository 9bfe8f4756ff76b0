use super::{AssignCohortRoleData, TaskType};
use crate::config::CohortRoleMap;
use crate::db;
use crate::services::discord::RoleAssigner;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn task_type(&self) -> TaskType;

    async fn handle(&self, task_id: Uuid, data: &serde_json::Value) -> Result<()>;
}

/// Handlers keyed by the task type tag stored in the row.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(handler.task_type().as_str(), handler);
        self
    }

    pub fn get(&self, task_type: &str) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(task_type)
    }
}

#[derive(Debug, Clone)]
pub struct GuildMember {
    pub discord_user_id: String,
    pub is_guild_member: bool,
}

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn find_member(&self, user_id: Uuid) -> Result<Option<GuildMember>>;
}

#[async_trait]
impl MemberDirectory for PgPool {
    async fn find_member(&self, user_id: Uuid) -> Result<Option<GuildMember>> {
        Ok(db::find_user_by_id(self, user_id).await?.map(|user| GuildMember {
            discord_user_id: user.discord_user_id,
            is_guild_member: user.is_guild_member,
        }))
    }
}

/// Gives a cohort member the Discord role of the cohort's track.
pub struct AssignCohortRoleHandler {
    members: Arc<dyn MemberDirectory>,
    roles: Arc<dyn RoleAssigner>,
    role_map: CohortRoleMap,
}

impl AssignCohortRoleHandler {
    pub fn new(members: Arc<dyn MemberDirectory>, roles: Arc<dyn RoleAssigner>, role_map: CohortRoleMap) -> Self {
        Self {
            members,
            roles,
            role_map,
        }
    }
}

#[async_trait]
impl TaskHandler for AssignCohortRoleHandler {
    fn task_type(&self) -> TaskType {
        TaskType::AssignCohortRole
    }

    async fn handle(&self, task_id: Uuid, data: &serde_json::Value) -> Result<()> {
        let data: AssignCohortRoleData =
            serde_json::from_value(data.clone()).context("invalid ASSIGN_COHORT_ROLE payload")?;

        let member = self
            .members
            .find_member(data.user_id)
            .await?
            .ok_or_else(|| anyhow!("User {} not found", data.user_id))?;

        if !member.is_guild_member {
            tracing::info!(
                "Task {}: user {} is not a guild member, skipping role assignment",
                task_id,
                data.user_id
            );
            return Ok(());
        }

        let role_id = self
            .role_map
            .role_for(data.cohort_type)
            .ok_or_else(|| anyhow!("No Discord role configured for cohort type {}", data.cohort_type.as_str()))?;

        self.roles
            .attach_role_to_member(&member.discord_user_id, role_id)
            .await?;
        tracing::info!(
            "Task {}: attached role {} to discord user {}",
            task_id,
            role_id,
            member.discord_user_id
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct FakeMembers(pub HashMap<Uuid, GuildMember>);

    #[async_trait]
    impl MemberDirectory for FakeMembers {
        async fn find_member(&self, user_id: Uuid) -> Result<Option<GuildMember>> {
            Ok(self.0.get(&user_id).cloned())
        }
    }

    #[derive(Default)]
    pub struct RecordingRoles {
        pub attached: Mutex<Vec<(String, String)>>,
        pub fail_with: Option<String>,
    }

    #[async_trait]
    impl RoleAssigner for RecordingRoles {
        async fn attach_role_to_member(&self, discord_user_id: &str, role_id: &str) -> Result<()> {
            if let Some(message) = &self.fail_with {
                return Err(anyhow!(message.clone()));
            }
            self.attached
                .lock()
                .await
                .push((discord_user_id.to_string(), role_id.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{FakeMembers, RecordingRoles};
    use super::*;
    use crate::domain::models::CohortType;

    fn role_map() -> CohortRoleMap {
        CohortRoleMap::new([(CohortType::MasteringBitcoin, "777".to_string())])
    }

    fn handler_for(member: GuildMember, user_id: Uuid, roles: Arc<RecordingRoles>) -> AssignCohortRoleHandler {
        let members = FakeMembers(HashMap::from([(user_id, member)]));
        AssignCohortRoleHandler::new(Arc::new(members), roles, role_map())
    }

    fn payload(user_id: Uuid, cohort_type: CohortType) -> serde_json::Value {
        serde_json::to_value(AssignCohortRoleData { user_id, cohort_type }).unwrap()
    }

    #[tokio::test]
    async fn test_attaches_mapped_role() {
        let user_id = Uuid::new_v4();
        let roles = Arc::new(RecordingRoles::default());
        let handler = handler_for(
            GuildMember {
                discord_user_id: "42".into(),
                is_guild_member: true,
            },
            user_id,
            roles.clone(),
        );

        handler
            .handle(Uuid::new_v4(), &payload(user_id, CohortType::MasteringBitcoin))
            .await
            .unwrap();
        assert_eq!(*roles.attached.lock().await, vec![("42".to_string(), "777".to_string())]);
    }

    #[tokio::test]
    async fn test_non_guild_member_is_skipped() {
        let user_id = Uuid::new_v4();
        let roles = Arc::new(RecordingRoles::default());
        let handler = handler_for(
            GuildMember {
                discord_user_id: "42".into(),
                is_guild_member: false,
            },
            user_id,
            roles.clone(),
        );

        handler
            .handle(Uuid::new_v4(), &payload(user_id, CohortType::MasteringBitcoin))
            .await
            .unwrap();
        assert!(roles.attached.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_cohort_type_fails() {
        let user_id = Uuid::new_v4();
        let handler = handler_for(
            GuildMember {
                discord_user_id: "42".into(),
                is_guild_member: true,
            },
            user_id,
            Arc::new(RecordingRoles::default()),
        );

        let err = handler
            .handle(Uuid::new_v4(), &payload(user_id, CohortType::ProgrammingBitcoin))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("PROGRAMMING_BITCOIN"));
    }

    #[tokio::test]
    async fn test_malformed_payload_fails() {
        let handler = handler_for(
            GuildMember {
                discord_user_id: "42".into(),
                is_guild_member: true,
            },
            Uuid::new_v4(),
            Arc::new(RecordingRoles::default()),
        );
        let err = handler
            .handle(Uuid::new_v4(), &serde_json::json!({ "user_id": "nope" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid ASSIGN_COHORT_ROLE payload"));
    }

    #[test]
    fn test_registry_lookup_by_tag() {
        let handler = handler_for(
            GuildMember {
                discord_user_id: "1".into(),
                is_guild_member: true,
            },
            Uuid::new_v4(),
            Arc::new(RecordingRoles::default()),
        );
        let registry = HandlerRegistry::new().register(Arc::new(handler));
        assert!(registry.get("ASSIGN_COHORT_ROLE").is_some());
        assert!(registry.get("SEND_EMAIL").is_none());
    }
}
