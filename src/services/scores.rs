use crate::db::{self, cohorts as cohort_db, scores as score_db, scores::WeekParticipant};
use crate::domain::grouping::{self, Candidate, GroupAssignment, GroupCapacity, FIRST_WEEK_GROUP};
use crate::domain::models::{Cohort, CohortType, CohortWeek, ExerciseScore, GroupDiscussionScore, User};
use crate::domain::scoring::ScoreTally;
use crate::error::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Inclusive bounds for every graded rubric value.
pub const MIN_GRADE: i32 = 0;
pub const MAX_GRADE: i32 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionScoreView {
    pub id: Uuid,
    pub attendance: bool,
    pub communication_score: i32,
    pub max_communication_score: i32,
    pub depth_of_answer_score: i32,
    pub max_depth_of_answer_score: i32,
    pub technical_bitcoin_fluency_score: i32,
    pub max_technical_bitcoin_fluency_score: i32,
    pub engagement_score: i32,
    pub max_engagement_score: i32,
    pub is_bonus_attempted: bool,
    pub bonus_answer_score: i32,
    pub max_bonus_answer_score: i32,
    pub bonus_followup_score: i32,
    pub max_bonus_followup_score: i32,
    pub total_score: f64,
    pub max_total_score: f64,
    pub group_number: Option<i32>,
}

impl From<&GroupDiscussionScore> for DiscussionScoreView {
    fn from(s: &GroupDiscussionScore) -> Self {
        Self {
            id: s.id,
            attendance: s.attendance,
            communication_score: s.communication_score,
            max_communication_score: s.max_communication_score,
            depth_of_answer_score: s.depth_of_answer_score,
            max_depth_of_answer_score: s.max_depth_of_answer_score,
            technical_bitcoin_fluency_score: s.technical_bitcoin_fluency_score,
            max_technical_bitcoin_fluency_score: s.max_technical_bitcoin_fluency_score,
            engagement_score: s.engagement_score,
            max_engagement_score: s.max_engagement_score,
            is_bonus_attempted: s.is_bonus_attempted,
            bonus_answer_score: s.bonus_answer_score,
            max_bonus_answer_score: s.max_bonus_answer_score,
            bonus_followup_score: s.bonus_followup_score,
            max_bonus_followup_score: s.max_bonus_followup_score,
            total_score: s.total_score(),
            max_total_score: s.max_score(),
            group_number: s.group_number,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseScoreView {
    pub id: Uuid,
    pub is_submitted: bool,
    pub is_passing: bool,
    pub has_good_documentation: bool,
    pub has_good_structure: bool,
    pub total_score: f64,
    pub max_total_score: f64,
}

impl From<&ExerciseScore> for ExerciseScoreView {
    fn from(s: &ExerciseScore) -> Self {
        Self {
            id: s.id,
            is_submitted: s.is_submitted,
            is_passing: s.is_passing,
            has_good_documentation: s.has_good_documentation,
            has_good_structure: s.has_good_structure,
            total_score: s.total_score(),
            max_total_score: s.max_score(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyScore {
    pub week_id: Uuid,
    pub group_discussion_scores: DiscussionScoreView,
    pub exercise_scores: ExerciseScoreView,
    pub total_score: f64,
    pub max_total_score: f64,
}

impl WeeklyScore {
    fn new(week_id: Uuid, discussion: &GroupDiscussionScore, exercise: &ExerciseScore) -> Self {
        let tally = ScoreTally::for_week(discussion, exercise);
        Self {
            week_id,
            group_discussion_scores: discussion.into(),
            exercise_scores: exercise.into(),
            total_score: tally.total_score,
            max_total_score: tally.max_total_score,
        }
    }

    fn tally(&self) -> ScoreTally {
        ScoreTally {
            total_score: self.total_score,
            max_total_score: self.max_total_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingAssistantInfo {
    pub id: Uuid,
    pub discord_username: String,
    pub discord_global_name: Option<String>,
    pub name: Option<String>,
}

impl From<&User> for TeachingAssistantInfo {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            discord_username: u.discord_user_name.clone(),
            discord_global_name: u.discord_global_name.clone(),
            name: u.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWeekScore {
    pub user_id: Uuid,
    pub discord_username: String,
    pub discord_global_name: Option<String>,
    pub name: Option<String>,
    pub teaching_assistant: Option<TeachingAssistantInfo>,
    #[serde(flatten)]
    pub score: WeeklyScore,
}

#[derive(Debug, Serialize)]
pub struct WeekScoresResponse {
    pub scores: Vec<UserWeekScore>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortScores {
    pub cohort_id: Uuid,
    pub cohort_type: CohortType,
    pub season_number: i32,
    pub weekly_scores: Vec<WeeklyScore>,
    pub total_score: f64,
    pub max_total_score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScoresResponse {
    pub cohorts: Vec<CohortScores>,
    pub total_score: f64,
    pub max_total_score: f64,
}

/// Partial score edit; absent fields keep their stored value.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdate {
    pub attendance: Option<bool>,
    pub communication_score: Option<i32>,
    pub depth_of_answer_score: Option<i32>,
    pub technical_bitcoin_fluency_score: Option<i32>,
    pub engagement_score: Option<i32>,
    pub is_bonus_attempted: Option<bool>,
    pub bonus_answer_score: Option<i32>,
    pub bonus_followup_score: Option<i32>,
    pub is_submitted: Option<bool>,
    pub is_passing: Option<bool>,
    pub has_good_documentation: Option<bool>,
    pub has_good_structure: Option<bool>,
}

impl ScoreUpdate {
    pub fn validate(&self) -> ServiceResult<()> {
        let graded = [
            ("communicationScore", self.communication_score),
            ("depthOfAnswerScore", self.depth_of_answer_score),
            ("technicalBitcoinFluencyScore", self.technical_bitcoin_fluency_score),
            ("engagementScore", self.engagement_score),
            ("bonusAnswerScore", self.bonus_answer_score),
            ("bonusFollowupScore", self.bonus_followup_score),
        ];
        for (field, value) in graded {
            if let Some(v) = value {
                if !(MIN_GRADE..=MAX_GRADE).contains(&v) {
                    return Err(ServiceError::BadRequest(format!(
                        "{} must be between {} and {}, got {}",
                        field, MIN_GRADE, MAX_GRADE, v
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn apply(&self, discussion: &mut GroupDiscussionScore, exercise: &mut ExerciseScore) {
        fn set<T: Copy>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        set(&mut discussion.attendance, self.attendance);
        set(&mut discussion.communication_score, self.communication_score);
        set(&mut discussion.depth_of_answer_score, self.depth_of_answer_score);
        set(
            &mut discussion.technical_bitcoin_fluency_score,
            self.technical_bitcoin_fluency_score,
        );
        set(&mut discussion.engagement_score, self.engagement_score);
        set(&mut discussion.is_bonus_attempted, self.is_bonus_attempted);
        set(&mut discussion.bonus_answer_score, self.bonus_answer_score);
        set(&mut discussion.bonus_followup_score, self.bonus_followup_score);

        set(&mut exercise.is_submitted, self.is_submitted);
        set(&mut exercise.is_passing, self.is_passing);
        set(&mut exercise.has_good_documentation, self.has_good_documentation);
        set(&mut exercise.has_good_structure, self.has_good_structure);
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAssignmentSummary {
    pub week_id: Uuid,
    pub week: i32,
    pub assigned: u64,
    pub skipped: usize,
}

/// Group number ascending with unassigned rows last, then user id.
fn week_score_order(a: &UserWeekScore, b: &UserWeekScore) -> std::cmp::Ordering {
    let key = |s: &UserWeekScore| {
        let group = s.score.group_discussion_scores.group_number;
        (group.is_none(), group)
    };
    key(a).cmp(&key(b)).then_with(|| a.user_id.cmp(&b.user_id))
}

/// Join one week's rows into per-user entries.
///
/// Every discussion row must have an exercise row and a user.
fn build_week_scores(
    week_id: Uuid,
    users: &[User],
    discussions: &[GroupDiscussionScore],
    exercises: &[ExerciseScore],
) -> ServiceResult<Vec<UserWeekScore>> {
    let users: HashMap<Uuid, &User> = users.iter().map(|u| (u.id, u)).collect();
    let exercises: HashMap<Uuid, &ExerciseScore> = exercises.iter().map(|e| (e.user_id, e)).collect();

    let mut scores = discussions
        .iter()
        .map(|discussion| {
            let user = users.get(&discussion.user_id).ok_or_else(|| {
                ServiceError::DataIntegrity(format!("User {} not found for score {}", discussion.user_id, discussion.id))
            })?;
            let exercise = exercises
                .get(&discussion.user_id)
                .ok_or_else(|| ServiceError::DataIntegrity(format!("Missing scores for user {}", discussion.user_id)))?;
            let teaching_assistant = discussion
                .assigned_teaching_assistant_id
                .and_then(|id| users.get(&id))
                .map(|ta| TeachingAssistantInfo::from(*ta));

            Ok(UserWeekScore {
                user_id: user.id,
                discord_username: user.discord_user_name.clone(),
                discord_global_name: user.discord_global_name.clone(),
                name: user.name.clone(),
                teaching_assistant,
                score: WeeklyScore::new(week_id, discussion, exercise),
            })
        })
        .collect::<ServiceResult<Vec<_>>>()?;

    scores.sort_by(week_score_order);
    Ok(scores)
}

/// Cohorts in the given order, weeks ascending; weeks missing either row are
/// left out of the totals.
fn summarize_user_scores(
    cohorts: &[Cohort],
    weeks: &[CohortWeek],
    discussions: &[GroupDiscussionScore],
    exercises: &[ExerciseScore],
) -> UserScoresResponse {
    let discussions: HashMap<Uuid, &GroupDiscussionScore> =
        discussions.iter().map(|s| (s.cohort_week_id, s)).collect();
    let exercises: HashMap<Uuid, &ExerciseScore> = exercises.iter().map(|s| (s.cohort_week_id, s)).collect();

    let cohorts: Vec<CohortScores> = cohorts
        .iter()
        .map(|cohort| {
            let mut cohort_weeks: Vec<&CohortWeek> = weeks.iter().filter(|w| w.cohort_id == cohort.id).collect();
            cohort_weeks.sort_by_key(|w| w.week);

            let weekly_scores: Vec<WeeklyScore> = cohort_weeks
                .into_iter()
                .filter_map(|week| {
                    let discussion = discussions.get(&week.id)?;
                    let exercise = exercises.get(&week.id)?;
                    Some(WeeklyScore::new(week.id, discussion, exercise))
                })
                .collect();
            let tally: ScoreTally = weekly_scores.iter().map(WeeklyScore::tally).sum();

            CohortScores {
                cohort_id: cohort.id,
                cohort_type: cohort.cohort_type,
                season_number: cohort.season,
                weekly_scores,
                total_score: tally.total_score,
                max_total_score: tally.max_total_score,
            }
        })
        .collect();

    let overall: ScoreTally = cohorts
        .iter()
        .map(|c| ScoreTally {
            total_score: c.total_score,
            max_total_score: c.max_total_score,
        })
        .sum();

    UserScoresResponse {
        cohorts,
        total_score: overall.total_score,
        max_total_score: overall.max_total_score,
    }
}

/// Pair every enrolled participant with last week's result.
///
/// A participant without a row for either week means the join-time row
/// creation was skipped, which is reported rather than ignored.
fn build_candidates(
    participants: &[WeekParticipant],
    previous_week: &[GroupDiscussionScore],
) -> ServiceResult<Vec<Candidate>> {
    let previous: HashMap<Uuid, &GroupDiscussionScore> = previous_week.iter().map(|s| (s.user_id, s)).collect();

    participants
        .iter()
        .map(|p| {
            let score_id = p.score_id.ok_or_else(|| {
                ServiceError::DataIntegrity(format!("Missing current week score for user {}", p.user_id))
            })?;
            let last = previous.get(&p.user_id).ok_or_else(|| {
                ServiceError::DataIntegrity(format!("Missing previous week score for user {}", p.user_id))
            })?;
            Ok(Candidate {
                user_id: p.user_id,
                score_id,
                was_present_previous_week: last.attendance,
                previous_total_score: last.total_score(),
            })
        })
        .collect()
}

pub async fn list_scores_for_cohort_and_week(
    pool: &PgPool,
    cohort_id: Uuid,
    week_id: Uuid,
) -> ServiceResult<WeekScoresResponse> {
    let mut conn = pool.acquire().await?;
    let week = cohort_db::find_week(&mut conn, week_id)
        .await?
        .filter(|w| w.cohort_id == cohort_id)
        .ok_or_else(|| ServiceError::NotFound(format!("Week {} not found in cohort {}", week_id, cohort_id)))?;

    let discussions = score_db::week_discussion_scores(&mut conn, week.id).await?;
    drop(conn);
    let exercises = score_db::week_exercise_scores(pool, week.id).await?;

    let mut user_ids: Vec<Uuid> = discussions
        .iter()
        .flat_map(|s| std::iter::once(s.user_id).chain(s.assigned_teaching_assistant_id))
        .collect();
    user_ids.sort();
    user_ids.dedup();
    let users = db::find_users_by_ids(pool, &user_ids).await?;

    let scores = build_week_scores(week.id, &users, &discussions, &exercises)?;
    Ok(WeekScoresResponse { scores })
}

pub async fn update_scores_for_user_cohort_and_week(
    pool: &PgPool,
    user_id: Uuid,
    cohort_id: Uuid,
    week_id: Uuid,
    update: &ScoreUpdate,
) -> ServiceResult<()> {
    update.validate()?;

    let mut tx = pool.begin().await?;
    let mut discussion = score_db::find_discussion_score(&mut tx, user_id, cohort_id, week_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Group discussion score for user {} in cohort {} and week {} not found",
                user_id, cohort_id, week_id
            ))
        })?;
    let mut exercise = score_db::find_exercise_score(&mut tx, user_id, cohort_id, week_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Exercise score for user {} in cohort {} and week {} not found",
                user_id, cohort_id, week_id
            ))
        })?;

    update.apply(&mut discussion, &mut exercise);
    score_db::save_discussion_score(&mut tx, &discussion).await?;
    score_db::save_exercise_score(&mut tx, &exercise).await?;
    tx.commit().await?;

    tracing::info!("Updated scores for user {} in week {}", user_id, week_id);
    Ok(())
}

pub async fn get_user_scores(pool: &PgPool, user_id: Uuid) -> ServiceResult<UserScoresResponse> {
    let cohorts = cohort_db::cohorts_for_user(pool, user_id).await?;
    let cohort_ids: Vec<Uuid> = cohorts.iter().map(|c| c.id).collect();
    let weeks = cohort_db::weeks_for_cohorts(pool, &cohort_ids).await?;
    let discussions = score_db::user_discussion_scores(pool, user_id).await?;
    let exercises = score_db::user_exercise_scores(pool, user_id).await?;

    Ok(summarize_user_scores(&cohorts, &weeks, &discussions, &exercises))
}

/// Writes a group assignment run makes for one week.
#[derive(Debug, PartialEq)]
enum GroupingPlan {
    /// Week 0 has no previous week; everyone lands in [`FIRST_WEEK_GROUP`].
    FirstWeek,
    Ranked {
        assignments: Vec<GroupAssignment>,
        /// Participants absent last week, left in their current group.
        skipped: usize,
    },
}

fn plan_group_assignment(
    week: &CohortWeek,
    previous: Option<&CohortWeek>,
    participants: &[WeekParticipant],
    previous_scores: &[GroupDiscussionScore],
    capacity: GroupCapacity,
) -> ServiceResult<GroupingPlan> {
    if week.week == 0 {
        return Ok(GroupingPlan::FirstWeek);
    }
    if previous.is_none() {
        return Err(ServiceError::BadRequest(format!(
            "Previous week for week {} not found",
            week.id
        )));
    }

    let candidates = build_candidates(participants, previous_scores)?;
    let total = candidates.len();
    let assignments = grouping::assign_groups(candidates, capacity);
    let skipped = total - assignments.len();
    Ok(GroupingPlan::Ranked { assignments, skipped })
}

/// Rank last week's attendees and split them into discussion groups.
///
/// Runs in one transaction holding the week row lock, so two runs for the
/// same week never interleave.
pub async fn assign_groups_for_cohort_week(
    pool: &PgPool,
    week_id: Uuid,
    groups_available: i64,
    participants_per_week: i64,
) -> ServiceResult<GroupAssignmentSummary> {
    let capacity = GroupCapacity::new(groups_available, participants_per_week)?;

    let mut tx = pool.begin().await?;
    let week = cohort_db::lock_week(&mut tx, week_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Week {} not found", week_id)))?;

    let previous = match week.week {
        0 => None,
        n => cohort_db::find_week_by_number(&mut tx, week.cohort_id, n - 1).await?,
    };
    let (participants, previous_scores) = match &previous {
        Some(prev) => (
            score_db::week_participants(&mut tx, week.cohort_id, week.id).await?,
            score_db::week_discussion_scores(&mut tx, prev.id).await?,
        ),
        None => (Vec::new(), Vec::new()),
    };

    let plan = plan_group_assignment(&week, previous.as_ref(), &participants, &previous_scores, capacity)?;
    let (assigned, skipped) = match plan {
        GroupingPlan::FirstWeek => {
            let assigned = score_db::set_week_group_number(&mut tx, week.id, FIRST_WEEK_GROUP).await?;
            tracing::info!("Week {} is the first week, put {} participants in group 0", week.id, assigned);
            (assigned, 0)
        }
        GroupingPlan::Ranked { assignments, skipped } => {
            let assigned = score_db::apply_group_assignments(&mut tx, &assignments).await?;
            tracing::info!(
                "Assigned {} participants of week {} to {} groups ({} absent last week)",
                assigned,
                week.id,
                groups_available,
                skipped
            );
            (assigned, skipped)
        }
    };
    tx.commit().await?;

    Ok(GroupAssignmentSummary {
        week_id: week.id,
        week: week.week,
        assigned,
        skipped,
    })
}

pub async fn assign_self_to_group(
    pool: &PgPool,
    week_id: Uuid,
    group_number: i32,
    teaching_assistant_id: Uuid,
) -> ServiceResult<u64> {
    let updated = score_db::assign_teaching_assistant(pool, week_id, group_number, teaching_assistant_id).await?;
    if updated == 0 {
        return Err(ServiceError::BadRequest(format!(
            "No participants in group {} for week {}",
            group_number, week_id
        )));
    }
    tracing::info!(
        "Teaching assistant {} took group {} of week {}",
        teaching_assistant_id,
        group_number,
        week_id
    );
    Ok(updated)
}
