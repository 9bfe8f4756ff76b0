use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    TeachingAssistant,
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::TeachingAssistant => "TEACHING_ASSISTANT",
            UserRole::Student => "STUDENT",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ADMIN" => Some(UserRole::Admin),
            "TEACHING_ASSISTANT" => Some(UserRole::TeachingAssistant),
            "STUDENT" => Some(UserRole::Student),
            _ => None,
        }
    }
}

/// Program track a cohort belongs to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "cohort_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CohortType {
    MasteringBitcoin,
    LearningBitcoinFromCommandLine,
    ProgrammingBitcoin,
    BitcoinProtocolDevelopment,
}

impl CohortType {
    pub const ALL: [CohortType; 4] = [
        CohortType::MasteringBitcoin,
        CohortType::LearningBitcoinFromCommandLine,
        CohortType::ProgrammingBitcoin,
        CohortType::BitcoinProtocolDevelopment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CohortType::MasteringBitcoin => "MASTERING_BITCOIN",
            CohortType::LearningBitcoinFromCommandLine => "LEARNING_BITCOIN_FROM_COMMAND_LINE",
            CohortType::ProgrammingBitcoin => "PROGRAMMING_BITCOIN",
            CohortType::BitcoinProtocolDevelopment => "BITCOIN_PROTOCOL_DEVELOPMENT",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub discord_user_id: String,
    pub discord_user_name: String,
    pub discord_global_name: Option<String>,
    pub name: Option<String>,
    pub role: UserRole,
    pub is_guild_member: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cohort {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub cohort_type: CohortType,
    pub season: i32,
    pub registration_deadline: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CohortWeek {
    pub id: Uuid,
    pub cohort_id: Uuid,
    pub week: i32,
    pub questions: sqlx::types::Json<Vec<String>>,
    pub bonus_questions: sqlx::types::Json<Vec<String>>,
    pub classroom_url: Option<String>,
    pub classroom_invite_link: Option<String>,
}

/// Weekly rubric record for one participant's live group discussion.
///
/// Every graded trait is a `(score, max)` pair so graders can use any rubric
/// scale; the derived totals live in [`crate::domain::scoring`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupDiscussionScore {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cohort_id: Uuid,
    pub cohort_week_id: Uuid,
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
    pub group_number: Option<i32>,
    pub assigned_teaching_assistant_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExerciseScore {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cohort_id: Uuid,
    pub cohort_week_id: Uuid,
    pub is_submitted: bool,
    pub is_passing: bool,
    pub has_good_documentation: bool,
    pub has_good_structure: bool,
}

#[cfg(test)]
impl GroupDiscussionScore {
    /// Fresh row with the column defaults.
    pub fn blank(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            cohort_id: Uuid::nil(),
            cohort_week_id: Uuid::nil(),
            attendance: false,
            communication_score: 0,
            max_communication_score: 5,
            depth_of_answer_score: 0,
            max_depth_of_answer_score: 5,
            technical_bitcoin_fluency_score: 0,
            max_technical_bitcoin_fluency_score: 5,
            engagement_score: 0,
            max_engagement_score: 5,
            is_bonus_attempted: false,
            bonus_answer_score: 0,
            max_bonus_answer_score: 5,
            bonus_followup_score: 0,
            max_bonus_followup_score: 5,
            group_number: None,
            assigned_teaching_assistant_id: None,
        }
    }
}

#[cfg(test)]
impl ExerciseScore {
    pub fn blank(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            cohort_id: Uuid::nil(),
            cohort_week_id: Uuid::nil(),
            is_submitted: false,
            is_passing: false,
            has_good_documentation: false,
            has_good_structure: false,
        }
    }
}
