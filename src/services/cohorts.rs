use crate::db::{cohorts as cohort_db, scores as score_db};
use crate::domain::models::{Cohort, CohortType, CohortWeek};
use crate::error::{ServiceError, ServiceResult};
use crate::tasks::{store, AssignCohortRoleData, NewTask};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

pub const MIN_WEEKS: i32 = 1;
pub const MAX_WEEKS: i32 = 8;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Unique `(type, season)` constraint on `cohorts`.
const COHORT_KEY_CONSTRAINT: &str = "cohorts_type_season_key";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCohortRequest {
    #[serde(rename = "type")]
    pub cohort_type: CohortType,
    pub season: i32,
    /// Number of the last week; week 0 is always created as well.
    pub weeks: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub registration_deadline: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCohort {
    pub id: Uuid,
    pub weeks_created: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedCohort {
    pub cohort_id: Uuid,
    pub score_rows_created: u64,
    pub task_id: Uuid,
}

/// Partial date change; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCohortRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub registration_deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCohortWeekRequest {
    pub questions: Option<Vec<String>>,
    #[serde(alias = "bonusQuestion")]
    pub bonus_questions: Option<Vec<String>>,
    pub classroom_url: Option<String>,
    pub classroom_invite_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCohortsQuery {
    #[serde(rename = "type")]
    pub cohort_type: Option<CohortType>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortWeekView {
    pub id: Uuid,
    pub week: i32,
    pub questions: Vec<String>,
    pub bonus_questions: Vec<String>,
    pub classroom_url: Option<String>,
    pub classroom_invite_link: Option<String>,
}

impl From<&CohortWeek> for CohortWeekView {
    fn from(w: &CohortWeek) -> Self {
        Self {
            id: w.id,
            week: w.week,
            questions: w.questions.0.clone(),
            bonus_questions: w.bonus_questions.0.clone(),
            classroom_url: w.classroom_url.clone(),
            classroom_invite_link: w.classroom_invite_link.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortDetail {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub cohort_type: CohortType,
    pub season: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub weeks: Vec<CohortWeekView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortPage {
    pub total_records: i64,
    pub records: Vec<CohortDetail>,
}

/// Cohort dates normalized to midnight UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortDates {
    pub registration_deadline: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl CohortDates {
    fn check_order(self) -> ServiceResult<Self> {
        if self.registration_deadline >= self.end_date {
            return Err(ServiceError::BadRequest(
                "Registration deadline must be before the end date.".into(),
            ));
        }
        if self.start_date >= self.end_date {
            return Err(ServiceError::BadRequest("Start date must be before the end date.".into()));
        }
        Ok(self)
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Whether `err` is the insert losing a race on the `(type, season)` key.
fn is_duplicate_cohort(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| {
            db.code().as_deref() == Some(UNIQUE_VIOLATION) && db.constraint() == Some(COHORT_KEY_CONSTRAINT)
        })
}

fn duplicate_cohort(cohort_type: CohortType, season: i32) -> ServiceError {
    ServiceError::BadRequest(format!(
        "Cohort of type {} and season {} already exists.",
        cohort_type.as_str(),
        season
    ))
}

/// Weeks of one cohort in week order.
fn cohort_detail(cohort: &Cohort, weeks: &[CohortWeek]) -> CohortDetail {
    let mut own: Vec<&CohortWeek> = weeks.iter().filter(|w| w.cohort_id == cohort.id).collect();
    own.sort_by_key(|w| w.week);
    CohortDetail {
        id: cohort.id,
        cohort_type: cohort.cohort_type,
        season: cohort.season,
        start_date: cohort.start_date,
        end_date: cohort.end_date,
        registration_deadline: cohort.registration_deadline,
        weeks: own.into_iter().map(CohortWeekView::from).collect(),
    }
}

impl ListCohortsQuery {
    /// `(limit, offset)` for the requested page.
    pub fn bounds(&self) -> ServiceResult<(i64, i64)> {
        let page = self.page.unwrap_or(0);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 0 {
            return Err(ServiceError::BadRequest("Page must not be negative.".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ServiceError::BadRequest(format!(
                "Page size must be between 1 and {}.",
                MAX_PAGE_SIZE
            )));
        }
        let offset = page
            .checked_mul(page_size)
            .ok_or_else(|| ServiceError::BadRequest("Page is out of range.".into()))?;
        Ok((page_size, offset))
    }
}

impl UpdateCohortRequest {
    /// Stored dates with this request's changes, re-checked as a whole.
    pub fn merge(&self, current: &Cohort) -> ServiceResult<CohortDates> {
        CohortDates {
            registration_deadline: self
                .registration_deadline
                .map_or(current.registration_deadline, midnight_utc),
            start_date: self.start_date.map_or(current.start_date, midnight_utc),
            end_date: self.end_date.map_or(current.end_date, midnight_utc),
        }
        .check_order()
    }
}

fn check_not_blank(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::BadRequest(format!("{} must not be empty.", field)));
    }
    Ok(())
}

impl UpdateCohortWeekRequest {
    pub fn validate(&self) -> ServiceResult<()> {
        for (field, list) in [("questions", &self.questions), ("bonusQuestions", &self.bonus_questions)] {
            for question in list.iter().flatten() {
                check_not_blank(field, question)?;
            }
        }
        if let Some(url) = &self.classroom_url {
            check_not_blank("classroomUrl", url)?;
        }
        if let Some(link) = &self.classroom_invite_link {
            check_not_blank("classroomInviteLink", link)?;
        }
        Ok(())
    }

    pub fn apply(&self, week: &mut CohortWeek) {
        if let Some(questions) = &self.questions {
            week.questions = sqlx::types::Json(questions.clone());
        }
        if let Some(questions) = &self.bonus_questions {
            week.bonus_questions = sqlx::types::Json(questions.clone());
        }
        if let Some(url) = &self.classroom_url {
            week.classroom_url = Some(url.clone());
        }
        if let Some(link) = &self.classroom_invite_link {
            week.classroom_invite_link = Some(link.clone());
        }
    }
}

impl CreateCohortRequest {
    pub fn validate(&self) -> ServiceResult<CohortDates> {
        if self.season < 1 {
            return Err(ServiceError::BadRequest("Season must be at least 1.".into()));
        }
        if !(MIN_WEEKS..=MAX_WEEKS).contains(&self.weeks) {
            return Err(ServiceError::BadRequest(format!(
                "Weeks must be between {} and {}.",
                MIN_WEEKS, MAX_WEEKS
            )));
        }

        CohortDates {
            registration_deadline: midnight_utc(self.registration_deadline),
            start_date: midnight_utc(self.start_date),
            end_date: midnight_utc(self.end_date),
        }
        .check_order()
    }
}

pub async fn get_cohort(pool: &PgPool, cohort_id: Uuid) -> ServiceResult<CohortDetail> {
    let cohort = cohort_db::find_cohort(pool, cohort_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cohort {} not found", cohort_id)))?;
    let weeks = cohort_db::weeks_for_cohorts(pool, &[cohort.id]).await?;
    Ok(cohort_detail(&cohort, &weeks))
}

pub async fn list_cohorts(pool: &PgPool, query: &ListCohortsQuery) -> ServiceResult<CohortPage> {
    let (limit, offset) = query.bounds()?;
    let cohorts = cohort_db::list_cohorts(pool, query.cohort_type, limit, offset).await?;
    let total_records = cohort_db::count_cohorts(pool, query.cohort_type).await?;

    let ids: Vec<Uuid> = cohorts.iter().map(|c| c.id).collect();
    let weeks = cohort_db::weeks_for_cohorts(pool, &ids).await?;
    Ok(CohortPage {
        total_records,
        records: cohorts.iter().map(|c| cohort_detail(c, &weeks)).collect(),
    })
}

pub async fn create_cohort(pool: &PgPool, request: &CreateCohortRequest) -> ServiceResult<CreatedCohort> {
    let dates = request.validate()?;

    let mut tx = pool.begin().await?;
    if cohort_db::cohort_exists(&mut tx, request.cohort_type, request.season).await? {
        return Err(duplicate_cohort(request.cohort_type, request.season));
    }

    // A concurrent create can still win between the check and the insert.
    let id = cohort_db::insert_cohort(
        &mut tx,
        request.cohort_type,
        request.season,
        dates.registration_deadline,
        dates.start_date,
        dates.end_date,
    )
    .await
    .map_err(|e| {
        if is_duplicate_cohort(&e) {
            duplicate_cohort(request.cohort_type, request.season)
        } else {
            e.into()
        }
    })?;
    cohort_db::insert_weeks(&mut tx, id, request.weeks).await?;
    tx.commit().await?;

    tracing::info!(
        "Created cohort {} ({} season {}) with weeks 0..={}",
        id,
        request.cohort_type.as_str(),
        request.season,
        request.weeks
    );
    Ok(CreatedCohort {
        id,
        weeks_created: request.weeks + 1,
    })
}

pub async fn update_cohort(
    pool: &PgPool,
    cohort_id: Uuid,
    request: &UpdateCohortRequest,
) -> ServiceResult<CohortDetail> {
    let mut tx = pool.begin().await?;
    let cohort = cohort_db::lock_cohort(&mut tx, cohort_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cohort {} not found", cohort_id)))?;

    let dates = request.merge(&cohort)?;
    cohort_db::update_cohort_dates(
        &mut tx,
        cohort.id,
        dates.registration_deadline,
        dates.start_date,
        dates.end_date,
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Updated dates of cohort {}", cohort.id);
    get_cohort(pool, cohort.id).await
}

pub async fn update_cohort_week(
    pool: &PgPool,
    cohort_id: Uuid,
    week_id: Uuid,
    request: &UpdateCohortWeekRequest,
) -> ServiceResult<CohortWeekView> {
    request.validate()?;

    let mut tx = pool.begin().await?;
    let mut week = cohort_db::lock_week(&mut tx, week_id)
        .await?
        .filter(|w| w.cohort_id == cohort_id)
        .ok_or_else(|| ServiceError::NotFound(format!("Week {} not found in cohort {}", week_id, cohort_id)))?;

    request.apply(&mut week);
    cohort_db::save_week(&mut tx, &week).await?;
    tx.commit().await?;

    tracing::info!("Updated week {} of cohort {}", week.week, cohort_id);
    Ok(CohortWeekView::from(&week))
}

/// Enroll a user: membership, one score pair per week and the role task all
/// commit together.
pub async fn join_cohort(pool: &PgPool, cohort_id: Uuid, user_id: Uuid) -> ServiceResult<JoinedCohort> {
    let cohort = cohort_db::find_cohort(pool, cohort_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cohort {} not found", cohort_id)))?;

    let mut tx = pool.begin().await?;
    if !cohort_db::add_member(&mut tx, cohort.id, user_id).await? {
        return Err(ServiceError::BadRequest(format!(
            "User {} already joined cohort {}",
            user_id, cohort.id
        )));
    }
    let score_rows_created = score_db::create_score_rows(&mut tx, user_id, cohort.id).await?;
    let task = NewTask::AssignCohortRole(AssignCohortRoleData {
        user_id,
        cohort_type: cohort.cohort_type,
    });
    let task_id = store::enqueue(&mut tx, &task).await?;
    tx.commit().await?;

    tracing::info!(
        "User {} joined cohort {} ({} weeks), role task {}",
        user_id,
        cohort.id,
        score_rows_created,
        task_id
    );
    Ok(JoinedCohort {
        cohort_id: cohort.id,
        score_rows_created,
        task_id,
    })
}

pub async fn remove_user_from_cohort(pool: &PgPool, cohort_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
    let mut tx = pool.begin().await?;
    score_db::delete_score_rows(&mut tx, user_id, cohort_id).await?;
    if !cohort_db::remove_member(&mut tx, cohort_id, user_id).await? {
        return Err(ServiceError::NotFound(format!(
            "User {} is not a member of cohort {}",
            user_id, cohort_id
        )));
    }
    tx.commit().await?;

    tracing::info!("Removed user {} from cohort {}", user_id, cohort_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateCohortRequest {
        serde_json::from_str(
            r#"{
                "type": "PROGRAMMING_BITCOIN",
                "season": 2,
                "weeks": 6,
                "startDate": "2024-03-04",
                "endDate": "2024-04-22",
                "registrationDeadline": "2024-03-01"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_request_normalizes_dates() {
        let dates = request().validate().unwrap();
        assert_eq!(dates.start_date.to_rfc3339(), "2024-03-04T00:00:00+00:00");
        assert_eq!(dates.registration_deadline.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_deadline_must_precede_end() {
        let mut req = request();
        req.registration_deadline = req.end_date;
        let err = req.validate().unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m.contains("Registration deadline")));
    }

    #[test]
    fn test_start_must_precede_end() {
        let mut req = request();
        req.start_date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let err = req.validate().unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m.contains("Start date")));
    }

    #[test]
    fn test_week_and_season_bounds() {
        let mut req = request();
        req.weeks = 0;
        assert!(req.validate().is_err());
        req.weeks = MAX_WEEKS + 1;
        assert!(req.validate().is_err());
        req.weeks = MAX_WEEKS;
        assert!(req.validate().is_ok());

        req.season = 0;
        assert!(req.validate().is_err());
    }

    fn stored_cohort() -> Cohort {
        let dates = request().validate().unwrap();
        Cohort {
            id: Uuid::new_v4(),
            cohort_type: CohortType::ProgrammingBitcoin,
            season: 2,
            registration_deadline: dates.registration_deadline,
            start_date: dates.start_date,
            end_date: dates.end_date,
        }
    }

    fn stored_week(cohort_id: Uuid, week: i32) -> CohortWeek {
        CohortWeek {
            id: Uuid::new_v4(),
            cohort_id,
            week,
            questions: sqlx::types::Json(vec!["What is a UTXO?".into()]),
            bonus_questions: sqlx::types::Json(vec![]),
            classroom_url: None,
            classroom_invite_link: None,
        }
    }

    #[test]
    fn test_update_keeps_unset_dates() {
        let cohort = stored_cohort();
        let update: UpdateCohortRequest = serde_json::from_str(r#"{"endDate": "2024-05-06"}"#).unwrap();
        let dates = update.merge(&cohort).unwrap();
        assert_eq!(dates.start_date, cohort.start_date);
        assert_eq!(dates.registration_deadline, cohort.registration_deadline);
        assert_eq!(dates.end_date.to_rfc3339(), "2024-05-06T00:00:00+00:00");
    }

    #[test]
    fn test_update_rechecks_merged_dates() {
        let cohort = stored_cohort();
        let end_before_start = UpdateCohortRequest {
            end_date: NaiveDate::from_ymd_opt(2024, 3, 2),
            ..Default::default()
        };
        let err = end_before_start.merge(&cohort).unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m.contains("Start date")));

        let late_deadline = UpdateCohortRequest {
            registration_deadline: NaiveDate::from_ymd_opt(2024, 4, 22),
            ..Default::default()
        };
        let err = late_deadline.merge(&cohort).unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m.contains("Registration deadline")));

        assert_eq!(
            UpdateCohortRequest::default().merge(&cohort).unwrap().end_date,
            cohort.end_date
        );
    }

    #[test]
    fn test_week_update_rejects_blank_text() {
        let blank_question: UpdateCohortWeekRequest =
            serde_json::from_str(r#"{"questions": ["Why SegWit?", "  "]}"#).unwrap();
        let err = blank_question.validate().unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m.contains("questions")));

        let blank_bonus: UpdateCohortWeekRequest = serde_json::from_str(r#"{"bonusQuestion": [""]}"#).unwrap();
        assert!(blank_bonus.validate().is_err());

        let blank_url = UpdateCohortWeekRequest {
            classroom_url: Some(String::new()),
            ..Default::default()
        };
        assert!(blank_url.validate().is_err());

        let empty_list = UpdateCohortWeekRequest {
            questions: Some(vec![]),
            ..Default::default()
        };
        assert!(empty_list.validate().is_ok());
    }

    #[test]
    fn test_week_update_only_touches_present_fields() {
        let mut week = stored_week(Uuid::new_v4(), 1);
        let update: UpdateCohortWeekRequest = serde_json::from_str(
            r#"{"bonusQuestions": ["Explain taproot"], "classroomUrl": "https://classroom.example/w1"}"#,
        )
        .unwrap();
        update.validate().unwrap();
        update.apply(&mut week);

        assert_eq!(week.questions.0, vec!["What is a UTXO?".to_string()]);
        assert_eq!(week.bonus_questions.0, vec!["Explain taproot".to_string()]);
        assert_eq!(week.classroom_url.as_deref(), Some("https://classroom.example/w1"));
        assert_eq!(week.classroom_invite_link, None);
    }

    #[test]
    fn test_cohort_detail_orders_own_weeks() {
        let cohort = stored_cohort();
        let weeks = vec![
            stored_week(cohort.id, 2),
            stored_week(Uuid::new_v4(), 0),
            stored_week(cohort.id, 0),
            stored_week(cohort.id, 1),
        ];
        let detail = cohort_detail(&cohort, &weeks);
        let numbers: Vec<i32> = detail.weeks.iter().map(|w| w.week).collect();
        assert_eq!(numbers, vec![0, 1, 2]);

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["type"], "PROGRAMMING_BITCOIN");
        assert!(json.get("registrationDeadline").is_some());
        assert_eq!(json["weeks"][0]["questions"][0], "What is a UTXO?");
        assert!(json["weeks"][0].get("bonusQuestions").is_some());
        assert!(json["weeks"][0].get("classroomInviteLink").is_some());
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(ListCohortsQuery::default().bounds().unwrap(), (DEFAULT_PAGE_SIZE, 0));

        let third_page = ListCohortsQuery {
            page: Some(2),
            page_size: Some(25),
            ..Default::default()
        };
        assert_eq!(third_page.bounds().unwrap(), (25, 50));

        for (page, page_size) in [(Some(-1), None), (None, Some(0)), (None, Some(MAX_PAGE_SIZE + 1))] {
            let query = ListCohortsQuery {
                page,
                page_size,
                ..Default::default()
            };
            assert!(matches!(query.bounds(), Err(ServiceError::BadRequest(_))));
        }

        let overflow = ListCohortsQuery {
            page: Some(i64::MAX),
            page_size: Some(2),
            ..Default::default()
        };
        assert!(overflow.bounds().is_err());
    }

    #[test]
    fn test_list_query_parses_type_filter() {
        let query: ListCohortsQuery =
            serde_json::from_str(r#"{"type": "MASTERING_BITCOIN", "pageSize": 5}"#).unwrap();
        assert_eq!(query.cohort_type, Some(CohortType::MasteringBitcoin));
        assert_eq!(query.page_size, Some(5));
    }

    #[test]
    fn test_only_key_violations_count_as_duplicates() {
        assert!(!is_duplicate_cohort(&anyhow::anyhow!("connection reset")));
        assert!(!is_duplicate_cohort(&anyhow::Error::new(sqlx::Error::RowNotFound)));
    }

    mod postgres {
        use super::*;

        #[sqlx::test]
        #[ignore = "needs DATABASE_URL"]
        async fn test_pg_racing_creates_yield_one_bad_request(pool: PgPool) {
            let req = request();
            let (a, b) = tokio::join!(create_cohort(&pool, &req), create_cohort(&pool, &req));
            let results = [a, b];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results
                .iter()
                .any(|r| matches!(r, Err(ServiceError::BadRequest(m)) if m.contains("already exists"))));
        }

        #[sqlx::test]
        #[ignore = "needs DATABASE_URL"]
        async fn test_pg_duplicate_insert_is_recognized(pool: PgPool) {
            let dates = request().validate().unwrap();
            let insert = move |pool: PgPool| async move {
                let mut conn = pool.acquire().await.unwrap();
                cohort_db::insert_cohort(
                    &mut conn,
                    CohortType::MasteringBitcoin,
                    1,
                    dates.registration_deadline,
                    dates.start_date,
                    dates.end_date,
                )
                .await
            };
            insert(pool.clone()).await.unwrap();
            let err = insert(pool).await.unwrap_err();
            assert!(is_duplicate_cohort(&err));
        }

        #[sqlx::test]
        #[ignore = "needs DATABASE_URL"]
        async fn test_pg_read_and_update_cohort(pool: PgPool) {
            let created = create_cohort(&pool, &request()).await.unwrap();
            let detail = get_cohort(&pool, created.id).await.unwrap();
            assert_eq!(detail.weeks.len(), 7);
            assert_eq!(detail.weeks[0].week, 0);

            let week_update: UpdateCohortWeekRequest =
                serde_json::from_str(r#"{"questions": ["What is a block header?"]}"#).unwrap();
            let week = update_cohort_week(&pool, created.id, detail.weeks[3].id, &week_update)
                .await
                .unwrap();
            assert_eq!(week.questions, vec!["What is a block header?".to_string()]);
            assert!(matches!(
                update_cohort_week(&pool, Uuid::new_v4(), detail.weeks[3].id, &week_update).await,
                Err(ServiceError::NotFound(_))
            ));

            let moved = UpdateCohortRequest {
                end_date: NaiveDate::from_ymd_opt(2024, 6, 3),
                ..Default::default()
            };
            let updated = update_cohort(&pool, created.id, &moved).await.unwrap();
            assert_eq!(updated.end_date.to_rfc3339(), "2024-06-03T00:00:00+00:00");
            assert_eq!(updated.weeks[3].questions, vec!["What is a block header?".to_string()]);

            let page = list_cohorts(&pool, &ListCohortsQuery::default()).await.unwrap();
            assert_eq!(page.total_records, 1);
            assert_eq!(page.records[0].id, created.id);

            let other_track = ListCohortsQuery {
                cohort_type: Some(CohortType::MasteringBitcoin),
                ..Default::default()
            };
            assert_eq!(list_cohorts(&pool, &other_track).await.unwrap().total_records, 0);
            assert!(matches!(
                get_cohort(&pool, Uuid::new_v4()).await,
                Err(ServiceError::NotFound(_))
            ));
        }
    }
}
