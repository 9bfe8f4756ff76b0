pub mod cohorts;
pub mod scores;

use crate::domain::models::User;
use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = r#"
    id,
    email,
    discord_user_id,
    discord_user_name,
    discord_global_name,
    name,
    role,
    is_guild_member,
    is_active,
    created_at
"#;

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_users_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<User>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(users)
}
