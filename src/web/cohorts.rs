use super::session::{UserSession, ADMIN_ONLY, STAFF};
use crate::error::ServiceResult;
use crate::services::cohorts::{
    self, CohortDetail, CohortPage, CohortWeekView, CreateCohortRequest, CreatedCohort, JoinedCohort,
    ListCohortsQuery, UpdateCohortRequest, UpdateCohortWeekRequest,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_cohorts).post(create_cohort))
        .route("/:cohort_id", get(get_cohort).patch(update_cohort))
        .route("/:cohort_id/weeks/:week_id", patch(update_week))
        .route("/:cohort_id/join", post(join_cohort))
        .route("/:cohort_id/users/:user_id", delete(remove_user))
        .with_state(state)
}

async fn list_cohorts(
    _session: UserSession,
    State(state): State<SharedState>,
    Query(query): Query<ListCohortsQuery>,
) -> ServiceResult<Json<CohortPage>> {
    let page = cohorts::list_cohorts(&state.pool, &query).await?;
    Ok(Json(page))
}

async fn get_cohort(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(cohort_id): Path<Uuid>,
) -> ServiceResult<Json<CohortDetail>> {
    let cohort = cohorts::get_cohort(&state.pool, cohort_id).await?;
    Ok(Json(cohort))
}

async fn create_cohort(
    session: UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateCohortRequest>,
) -> ServiceResult<(StatusCode, Json<CreatedCohort>)> {
    session.require_role(ADMIN_ONLY)?;
    let created = cohorts::create_cohort(&state.pool, &payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_cohort(
    session: UserSession,
    State(state): State<SharedState>,
    Path(cohort_id): Path<Uuid>,
    Json(payload): Json<UpdateCohortRequest>,
) -> ServiceResult<Json<CohortDetail>> {
    session.require_role(STAFF)?;
    let cohort = cohorts::update_cohort(&state.pool, cohort_id, &payload).await?;
    Ok(Json(cohort))
}

async fn update_week(
    session: UserSession,
    State(state): State<SharedState>,
    Path((cohort_id, week_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCohortWeekRequest>,
) -> ServiceResult<Json<CohortWeekView>> {
    session.require_role(STAFF)?;
    let week = cohorts::update_cohort_week(&state.pool, cohort_id, week_id, &payload).await?;
    Ok(Json(week))
}

async fn join_cohort(
    session: UserSession,
    State(state): State<SharedState>,
    Path(cohort_id): Path<Uuid>,
) -> ServiceResult<Json<JoinedCohort>> {
    let joined = cohorts::join_cohort(&state.pool, cohort_id, session.user_id).await?;
    Ok(Json(joined))
}

async fn remove_user(
    session: UserSession,
    State(state): State<SharedState>,
    Path((cohort_id, user_id)): Path<(Uuid, Uuid)>,
) -> ServiceResult<StatusCode> {
    session.require_role(ADMIN_ONLY)?;
    cohorts::remove_user_from_cohort(&state.pool, cohort_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
