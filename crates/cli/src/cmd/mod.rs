pub mod member;
pub mod refresh;
pub mod schedule;
pub mod stats;
