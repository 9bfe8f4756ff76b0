use crate::domain::models::{Cohort, CohortType, CohortWeek};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const WEEK_COLUMNS: &str = r#"
    id,
    cohort_id,
    week,
    questions,
    bonus_questions,
    classroom_url,
    classroom_invite_link
"#;

pub async fn find_cohort(pool: &PgPool, id: Uuid) -> Result<Option<Cohort>> {
    let cohort = sqlx::query_as::<_, Cohort>(
        r#"
        SELECT id, type, season, registration_deadline, start_date, end_date
        FROM cohorts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(cohort)
}

/// Newest cohorts first, optionally for one program track.
pub async fn list_cohorts(
    pool: &PgPool,
    cohort_type: Option<CohortType>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Cohort>> {
    let cohorts = sqlx::query_as::<_, Cohort>(
        r#"
        SELECT id, type, season, registration_deadline, start_date, end_date
        FROM cohorts
        WHERE $1::cohort_type IS NULL OR type = $1
        ORDER BY created_at DESC, id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(cohort_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(cohorts)
}

pub async fn count_cohorts(pool: &PgPool, cohort_type: Option<CohortType>) -> Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cohorts WHERE $1::cohort_type IS NULL OR type = $1")
        .bind(cohort_type)
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn lock_cohort(conn: &mut PgConnection, id: Uuid) -> Result<Option<Cohort>> {
    let cohort = sqlx::query_as::<_, Cohort>(
        r#"
        SELECT id, type, season, registration_deadline, start_date, end_date
        FROM cohorts
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(cohort)
}

pub async fn update_cohort_dates(
    conn: &mut PgConnection,
    id: Uuid,
    registration_deadline: DateTime<Utc>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE cohorts
        SET registration_deadline = $2,
            start_date = $3,
            end_date = $4,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(registration_deadline)
    .bind(start_date)
    .bind(end_date)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn cohorts_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Cohort>> {
    let cohorts = sqlx::query_as::<_, Cohort>(
        r#"
        SELECT c.id, c.type, c.season, c.registration_deadline, c.start_date, c.end_date
        FROM cohorts c
        JOIN cohort_users cu ON cu.cohort_id = c.id
        WHERE cu.user_id = $1
        ORDER BY c.start_date, c.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(cohorts)
}

pub async fn cohort_exists(conn: &mut PgConnection, cohort_type: CohortType, season: i32) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cohorts WHERE type = $1 AND season = $2)")
        .bind(cohort_type)
        .bind(season)
        .fetch_one(conn)
        .await?;
    Ok(exists)
}

pub async fn insert_cohort(
    conn: &mut PgConnection,
    cohort_type: CohortType,
    season: i32,
    registration_deadline: DateTime<Utc>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO cohorts (id, type, season, registration_deadline, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(cohort_type)
    .bind(season)
    .bind(registration_deadline)
    .bind(start_date)
    .bind(end_date)
    .execute(conn)
    .await?;
    Ok(id)
}

/// Weeks `0..=last_week`.
pub async fn insert_weeks(conn: &mut PgConnection, cohort_id: Uuid, last_week: i32) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cohort_weeks (cohort_id, week)
        SELECT $1, generate_series(0, $2)
        "#,
    )
    .bind(cohort_id)
    .bind(last_week)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_week(conn: &mut PgConnection, week_id: Uuid) -> Result<Option<CohortWeek>> {
    let week = sqlx::query_as::<_, CohortWeek>(&format!("SELECT {WEEK_COLUMNS} FROM cohort_weeks WHERE id = $1"))
        .bind(week_id)
        .fetch_optional(conn)
        .await?;
    Ok(week)
}

/// Row-locks the week until the surrounding transaction ends.
pub async fn lock_week(conn: &mut PgConnection, week_id: Uuid) -> Result<Option<CohortWeek>> {
    let week = sqlx::query_as::<_, CohortWeek>(&format!(
        "SELECT {WEEK_COLUMNS} FROM cohort_weeks WHERE id = $1 FOR UPDATE"
    ))
    .bind(week_id)
    .fetch_optional(conn)
    .await?;
    Ok(week)
}

pub async fn find_week_by_number(conn: &mut PgConnection, cohort_id: Uuid, week: i32) -> Result<Option<CohortWeek>> {
    let week = sqlx::query_as::<_, CohortWeek>(&format!(
        "SELECT {WEEK_COLUMNS} FROM cohort_weeks WHERE cohort_id = $1 AND week = $2"
    ))
    .bind(cohort_id)
    .bind(week)
    .fetch_optional(conn)
    .await?;
    Ok(week)
}

pub async fn weeks_for_cohorts(pool: &PgPool, cohort_ids: &[Uuid]) -> Result<Vec<CohortWeek>> {
    let weeks = sqlx::query_as::<_, CohortWeek>(&format!(
        "SELECT {WEEK_COLUMNS} FROM cohort_weeks WHERE cohort_id = ANY($1) ORDER BY cohort_id, week"
    ))
    .bind(cohort_ids)
    .fetch_all(pool)
    .await?;
    Ok(weeks)
}

pub async fn save_week(conn: &mut PgConnection, week: &CohortWeek) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE cohort_weeks
        SET questions = $2,
            bonus_questions = $3,
            classroom_url = $4,
            classroom_invite_link = $5,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(week.id)
    .bind(&week.questions)
    .bind(&week.bonus_questions)
    .bind(&week.classroom_url)
    .bind(&week.classroom_invite_link)
    .execute(conn)
    .await?;
    Ok(())
}

/// Returns false when the user was already enrolled.
pub async fn add_member(conn: &mut PgConnection, cohort_id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO cohort_users (cohort_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(cohort_id)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove_member(conn: &mut PgConnection, cohort_id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cohort_users WHERE cohort_id = $1 AND user_id = $2")
        .bind(cohort_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
