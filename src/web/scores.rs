use super::session::{UserSession, STAFF};
use crate::error::ServiceResult;
use crate::services::scores::{
    self, GroupAssignmentSummary, ScoreUpdate, UserScoresResponse, WeekScoresResponse,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignGroupsPayload {
    pub groups_available: i64,
    pub participants_per_week: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignSelfResponse {
    pub updated: u64,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/cohort/:cohort_id/week/:week_id", get(list_week_scores))
        .route("/user/:user_id/cohort/:cohort_id/week/:week_id", patch(update_scores))
        .route("/me", get(my_scores))
        .route("/user/:user_id", get(user_scores))
        .route("/week/:week_id/assign-groups", post(assign_groups))
        .route("/week/:week_id/group/:group_number/assign-self", post(assign_self))
        .with_state(state)
}

async fn list_week_scores(
    session: UserSession,
    State(state): State<SharedState>,
    Path((cohort_id, week_id)): Path<(Uuid, Uuid)>,
) -> ServiceResult<Json<WeekScoresResponse>> {
    session.require_role(STAFF)?;
    let scores = scores::list_scores_for_cohort_and_week(&state.pool, cohort_id, week_id).await?;
    Ok(Json(scores))
}

async fn update_scores(
    session: UserSession,
    State(state): State<SharedState>,
    Path((user_id, cohort_id, week_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<ScoreUpdate>,
) -> ServiceResult<StatusCode> {
    session.require_role(STAFF)?;
    scores::update_scores_for_user_cohort_and_week(&state.pool, user_id, cohort_id, week_id, &payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn my_scores(session: UserSession, State(state): State<SharedState>) -> ServiceResult<Json<UserScoresResponse>> {
    let summary = scores::get_user_scores(&state.pool, session.user_id).await?;
    Ok(Json(summary))
}

async fn user_scores(
    session: UserSession,
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> ServiceResult<Json<UserScoresResponse>> {
    session.require_role(STAFF)?;
    let summary = scores::get_user_scores(&state.pool, user_id).await?;
    Ok(Json(summary))
}

async fn assign_groups(
    session: UserSession,
    State(state): State<SharedState>,
    Path(week_id): Path<Uuid>,
    Json(payload): Json<AssignGroupsPayload>,
) -> ServiceResult<Json<GroupAssignmentSummary>> {
    session.require_role(STAFF)?;
    tracing::info!("User {} triggered group assignment for week {}", session.user_id, week_id);
    let summary = scores::assign_groups_for_cohort_week(
        &state.pool,
        week_id,
        payload.groups_available,
        payload.participants_per_week,
    )
    .await?;
    Ok(Json(summary))
}

async fn assign_self(
    session: UserSession,
    State(state): State<SharedState>,
    Path((week_id, group_number)): Path<(Uuid, i32)>,
) -> ServiceResult<Json<AssignSelfResponse>> {
    session.require_role(STAFF)?;
    let updated = scores::assign_self_to_group(&state.pool, week_id, group_number, session.user_id).await?;
    Ok(Json(AssignSelfResponse { updated }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grouping::GroupCapacity;
    use crate::error::ServiceError;

    fn capacity_status(body: &str) -> StatusCode {
        let payload: AssignGroupsPayload = serde_json::from_str(body).unwrap();
        match GroupCapacity::new(payload.groups_available, payload.participants_per_week) {
            Ok(_) => StatusCode::OK,
            Err(e) => ServiceError::from(e).status_code(),
        }
    }

    #[test]
    fn test_negative_and_zero_capacity_are_both_bad_requests() {
        assert_eq!(
            capacity_status(r#"{"groupsAvailable": -1, "participantsPerWeek": 5}"#),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            capacity_status(r#"{"groupsAvailable": 0, "participantsPerWeek": 5}"#),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            capacity_status(r#"{"groupsAvailable": 3, "participantsPerWeek": -2}"#),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            capacity_status(r#"{"groupsAvailable": 3, "participantsPerWeek": 5}"#),
            StatusCode::OK
        );
    }
}
