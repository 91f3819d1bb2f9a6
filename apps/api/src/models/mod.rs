pub mod action_log;
pub mod candidate;
pub mod job;
