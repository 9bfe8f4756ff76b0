use crate::domain::models::{ExerciseScore, GroupDiscussionScore};
use crate::domain::ratio::ratio;
use serde::Serialize;

pub struct DiscussionWeights {
    pub communication: f64,
    pub depth: f64,
    pub technical: f64,
    pub engagement: f64,
}

pub struct BonusWeights {
    pub attempt: f64,
    pub answer: f64,
    pub followup: f64,
}

pub struct ExerciseWeights {
    pub submission: f64,
    pub tests: f64,
    pub documentation: f64,
    pub structure: f64,
}

pub const DISCUSSION_WEIGHTS: DiscussionWeights = DiscussionWeights {
    communication: 30.0,
    depth: 30.0,
    technical: 20.0,
    engagement: 20.0,
};

pub const BONUS_WEIGHTS: BonusWeights = BonusWeights {
    attempt: 10.0,
    answer: 30.0,
    followup: 10.0,
};

pub const EXERCISE_WEIGHTS: ExerciseWeights = ExerciseWeights {
    submission: 10.0,
    tests: 50.0,
    documentation: 20.0,
    structure: 20.0,
};

impl GroupDiscussionScore {
    pub fn graded_score(&self) -> f64 {
        let w = &DISCUSSION_WEIGHTS;
        w.communication * ratio(self.communication_score, self.max_communication_score)
            + w.depth * ratio(self.depth_of_answer_score, self.max_depth_of_answer_score)
            + w.technical
                * ratio(
                    self.technical_bitcoin_fluency_score,
                    self.max_technical_bitcoin_fluency_score,
                )
            + w.engagement * ratio(self.engagement_score, self.max_engagement_score)
    }

    pub fn bonus_score(&self) -> f64 {
        let w = &BONUS_WEIGHTS;
        let attempt = if self.is_bonus_attempted { w.attempt } else { 0.0 };
        attempt
            + w.answer * ratio(self.bonus_answer_score, self.max_bonus_answer_score)
            + w.followup * ratio(self.bonus_followup_score, self.max_bonus_followup_score)
    }

    /// Graded round plus bonus round, in `[0, 150]`.
    pub fn total_score(&self) -> f64 {
        self.graded_score() + self.bonus_score()
    }

    pub fn max_score(&self) -> f64 {
        let d = &DISCUSSION_WEIGHTS;
        let b = &BONUS_WEIGHTS;
        d.communication + d.depth + d.technical + d.engagement + b.attempt + b.answer + b.followup
    }
}

impl ExerciseScore {
    pub fn total_score(&self) -> f64 {
        let w = &EXERCISE_WEIGHTS;
        [
            (self.is_submitted, w.submission),
            (self.is_passing, w.tests),
            (self.has_good_documentation, w.documentation),
            (self.has_good_structure, w.structure),
        ]
        .iter()
        .filter(|(flag, _)| *flag)
        .map(|(_, points)| points)
        .sum()
    }

    pub fn max_score(&self) -> f64 {
        let w = &EXERCISE_WEIGHTS;
        w.submission + w.tests + w.documentation + w.structure
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ScoreTally {
    pub total_score: f64,
    pub max_total_score: f64,
}

impl ScoreTally {
    pub const ZERO: ScoreTally = ScoreTally {
        total_score: 0.0,
        max_total_score: 0.0,
    };

    /// One week's combined discussion and exercise score.
    pub fn for_week(discussion: &GroupDiscussionScore, exercise: &ExerciseScore) -> Self {
        Self {
            total_score: discussion.total_score() + exercise.total_score(),
            max_total_score: discussion.max_score() + exercise.max_score(),
        }
    }

    pub fn add(self, other: ScoreTally) -> Self {
        Self {
            total_score: self.total_score + other.total_score,
            max_total_score: self.max_total_score + other.max_total_score,
        }
    }
}

impl std::iter::Sum for ScoreTally {
    fn sum<I: Iterator<Item = ScoreTally>>(iter: I) -> Self {
        iter.fold(ScoreTally::ZERO, ScoreTally::add)
    }
}
