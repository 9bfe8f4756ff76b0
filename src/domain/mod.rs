pub mod grouping;
pub mod models;
pub mod ratio;
pub mod scoring;
