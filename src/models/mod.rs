pub mod exercise;
pub mod progress;
pub mod schedule;
