pub mod cohorts;
pub mod discord;
pub mod scores;
