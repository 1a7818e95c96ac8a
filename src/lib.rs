pub mod attendance;
pub mod input;
pub mod models;
pub mod report;
