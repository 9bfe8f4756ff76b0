use crate::domain::grouping::GroupAssignment;
use crate::domain::models::{ExerciseScore, GroupDiscussionScore};
use anyhow::Result;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const DISCUSSION_COLUMNS: &str = r#"
    id,
    user_id,
    cohort_id,
    cohort_week_id,
    attendance,
    communication_score,
    max_communication_score,
    depth_of_answer_score,
    max_depth_of_answer_score,
    technical_bitcoin_fluency_score,
    max_technical_bitcoin_fluency_score,
    engagement_score,
    max_engagement_score,
    is_bonus_attempted,
    bonus_answer_score,
    max_bonus_answer_score,
    bonus_followup_score,
    max_bonus_followup_score,
    group_number,
    assigned_teaching_assistant_id
"#;

const EXERCISE_COLUMNS: &str = r#"
    id,
    user_id,
    cohort_id,
    cohort_week_id,
    is_submitted,
    is_passing,
    has_good_documentation,
    has_good_structure
"#;

/// Enrolled user together with their discussion row for one week, if any.
#[derive(Debug, Clone, FromRow)]
pub struct WeekParticipant {
    pub user_id: Uuid,
    pub score_id: Option<Uuid>,
}

pub async fn week_discussion_scores(conn: &mut PgConnection, week_id: Uuid) -> Result<Vec<GroupDiscussionScore>> {
    let rows = sqlx::query_as::<_, GroupDiscussionScore>(&format!(
        "SELECT {DISCUSSION_COLUMNS} FROM group_discussion_scores WHERE cohort_week_id = $1"
    ))
    .bind(week_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn week_exercise_scores(pool: &PgPool, week_id: Uuid) -> Result<Vec<ExerciseScore>> {
    let rows = sqlx::query_as::<_, ExerciseScore>(&format!(
        "SELECT {EXERCISE_COLUMNS} FROM exercise_scores WHERE cohort_week_id = $1"
    ))
    .bind(week_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn week_participants(conn: &mut PgConnection, cohort_id: Uuid, week_id: Uuid) -> Result<Vec<WeekParticipant>> {
    let rows = sqlx::query_as::<_, WeekParticipant>(
        r#"
        SELECT cu.user_id, gds.id AS score_id
        FROM cohort_users cu
        LEFT JOIN group_discussion_scores gds
            ON gds.user_id = cu.user_id AND gds.cohort_week_id = $2
        WHERE cu.cohort_id = $1
        ORDER BY cu.joined_at, cu.user_id
        "#,
    )
    .bind(cohort_id)
    .bind(week_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn user_discussion_scores(pool: &PgPool, user_id: Uuid) -> Result<Vec<GroupDiscussionScore>> {
    let rows = sqlx::query_as::<_, GroupDiscussionScore>(&format!(
        "SELECT {DISCUSSION_COLUMNS} FROM group_discussion_scores WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn user_exercise_scores(pool: &PgPool, user_id: Uuid) -> Result<Vec<ExerciseScore>> {
    let rows = sqlx::query_as::<_, ExerciseScore>(&format!(
        "SELECT {EXERCISE_COLUMNS} FROM exercise_scores WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_discussion_score(
    conn: &mut PgConnection,
    user_id: Uuid,
    cohort_id: Uuid,
    week_id: Uuid,
) -> Result<Option<GroupDiscussionScore>> {
    let row = sqlx::query_as::<_, GroupDiscussionScore>(&format!(
        r#"
        SELECT {DISCUSSION_COLUMNS}
        FROM group_discussion_scores
        WHERE user_id = $1 AND cohort_id = $2 AND cohort_week_id = $3
        FOR UPDATE
        "#
    ))
    .bind(user_id)
    .bind(cohort_id)
    .bind(week_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn find_exercise_score(
    conn: &mut PgConnection,
    user_id: Uuid,
    cohort_id: Uuid,
    week_id: Uuid,
) -> Result<Option<ExerciseScore>> {
    let row = sqlx::query_as::<_, ExerciseScore>(&format!(
        r#"
        SELECT {EXERCISE_COLUMNS}
        FROM exercise_scores
        WHERE user_id = $1 AND cohort_id = $2 AND cohort_week_id = $3
        FOR UPDATE
        "#
    ))
    .bind(user_id)
    .bind(cohort_id)
    .bind(week_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Persist the grader-editable fields of a discussion row.
pub async fn save_discussion_score(conn: &mut PgConnection, score: &GroupDiscussionScore) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE group_discussion_scores
        SET attendance = $2,
            communication_score = $3,
            depth_of_answer_score = $4,
            technical_bitcoin_fluency_score = $5,
            engagement_score = $6,
            is_bonus_attempted = $7,
            bonus_answer_score = $8,
            bonus_followup_score = $9,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(score.id)
    .bind(score.attendance)
    .bind(score.communication_score)
    .bind(score.depth_of_answer_score)
    .bind(score.technical_bitcoin_fluency_score)
    .bind(score.engagement_score)
    .bind(score.is_bonus_attempted)
    .bind(score.bonus_answer_score)
    .bind(score.bonus_followup_score)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn save_exercise_score(conn: &mut PgConnection, score: &ExerciseScore) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE exercise_scores
        SET is_submitted = $2,
            is_passing = $3,
            has_good_documentation = $4,
            has_good_structure = $5,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(score.id)
    .bind(score.is_submitted)
    .bind(score.is_passing)
    .bind(score.has_good_documentation)
    .bind(score.has_good_structure)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn set_week_group_number(conn: &mut PgConnection, week_id: Uuid, group_number: i32) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE group_discussion_scores
        SET group_number = $2, updated_at = now()
        WHERE cohort_week_id = $1
        "#,
    )
    .bind(week_id)
    .bind(group_number)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Write every assignment in one statement.
pub async fn apply_group_assignments(conn: &mut PgConnection, assignments: &[GroupAssignment]) -> Result<u64> {
    if assignments.is_empty() {
        return Ok(0);
    }
    let ids: Vec<Uuid> = assignments.iter().map(|a| a.score_id).collect();
    let groups: Vec<i32> = assignments.iter().map(|a| a.group_number).collect();

    let result = sqlx::query(
        r#"
        UPDATE group_discussion_scores AS gds
        SET group_number = u.group_number, updated_at = now()
        FROM UNNEST($1::uuid[], $2::int4[]) AS u(id, group_number)
        WHERE gds.id = u.id
        "#,
    )
    .bind(&ids)
    .bind(&groups)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn assign_teaching_assistant(
    pool: &PgPool,
    week_id: Uuid,
    group_number: i32,
    teaching_assistant_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE group_discussion_scores
        SET assigned_teaching_assistant_id = $3, updated_at = now()
        WHERE cohort_week_id = $1 AND group_number = $2
        "#,
    )
    .bind(week_id)
    .bind(group_number)
    .bind(teaching_assistant_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// One discussion row and one exercise row per week of the cohort.
pub async fn create_score_rows(conn: &mut PgConnection, user_id: Uuid, cohort_id: Uuid) -> Result<u64> {
    let discussion = sqlx::query(
        r#"
        INSERT INTO group_discussion_scores (user_id, cohort_id, cohort_week_id)
        SELECT $1, cw.cohort_id, cw.id
        FROM cohort_weeks cw
        WHERE cw.cohort_id = $2
        ON CONFLICT (user_id, cohort_week_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(cohort_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO exercise_scores (user_id, cohort_id, cohort_week_id)
        SELECT $1, cw.cohort_id, cw.id
        FROM cohort_weeks cw
        WHERE cw.cohort_id = $2
        ON CONFLICT (user_id, cohort_week_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(cohort_id)
    .execute(&mut *conn)
    .await?;

    Ok(discussion.rows_affected())
}

pub async fn delete_score_rows(conn: &mut PgConnection, user_id: Uuid, cohort_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM group_discussion_scores WHERE user_id = $1 AND cohort_id = $2")
        .bind(user_id)
        .bind(cohort_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM exercise_scores WHERE user_id = $1 AND cohort_id = $2")
        .bind(user_id)
        .bind(cohort_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
