//! Rank-based discussion group bucketing.
//!
//! Participants are ranked by their previous week: attendance first, then
//! total score descending. Present participants fill groups `1..=groups` in
//! blocks of `per_group`; anyone beyond that capacity is dealt round-robin
//! across the same groups. Absent participants keep whatever group they had.

use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

/// Group number given to everyone in a cohort's first week.
pub const FIRST_WEEK_GROUP: i32 = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub user_id: Uuid,
    /// Current-week discussion row that receives the group number.
    pub score_id: Uuid,
    pub was_present_previous_week: bool,
    pub previous_total_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupAssignment {
    pub user_id: Uuid,
    pub score_id: Uuid,
    pub group_number: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct GroupCapacity {
    groups_available: u32,
    participants_per_group: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupingError {
    #[error("groups_available must be at least 1")]
    NoGroups,
    #[error("participants_per_week must be at least 1")]
    EmptyGroups,
    #[error("groups_available and participants_per_week must not exceed {}", i32::MAX)]
    TooLarge,
}

impl GroupCapacity {
    /// Takes raw request values so negative and zero inputs fail the same way.
    pub fn new(groups_available: i64, participants_per_group: i64) -> Result<Self, GroupingError> {
        if groups_available < 1 {
            return Err(GroupingError::NoGroups);
        }
        if participants_per_group < 1 {
            return Err(GroupingError::EmptyGroups);
        }
        // Group numbers are stored as int4.
        let groups_available = u32::try_from(groups_available)
            .ok()
            .filter(|n| *n <= i32::MAX as u32)
            .ok_or(GroupingError::TooLarge)?;
        let participants_per_group = u32::try_from(participants_per_group)
            .ok()
            .filter(|n| *n <= i32::MAX as u32)
            .ok_or(GroupingError::TooLarge)?;
        Ok(Self {
            groups_available,
            participants_per_group,
        })
    }

    pub fn total(&self) -> usize {
        self.groups_available as usize * self.participants_per_group as usize
    }

    /// Group for the participant at `rank` in the sorted order.
    pub fn group_for_rank(&self, rank: usize) -> i32 {
        let per_group = self.participants_per_group as usize;
        let groups = self.groups_available as usize;
        let total = self.total();
        let group = if rank < total {
            rank / per_group + 1
        } else {
            (rank - total) % groups + 1
        };
        group as i32
    }
}

fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.was_present_previous_week
        .cmp(&a.was_present_previous_week)
        .then_with(|| b.previous_total_score.total_cmp(&a.previous_total_score))
}

/// Stable sort; ties keep their input order.
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(rank_order);
}

pub fn assign_groups(mut candidates: Vec<Candidate>, capacity: GroupCapacity) -> Vec<GroupAssignment> {
    rank_candidates(&mut candidates);

    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.was_present_previous_week)
        .map(|(rank, c)| GroupAssignment {
            user_id: c.user_id,
            score_id: c.score_id,
            group_number: capacity.group_for_rank(rank),
        })
        .collect()
}
