pub mod core;
pub mod lectures;
pub mod schedule;
