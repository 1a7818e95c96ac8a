use std::path::Path;

use anyhow::Context;

use crate::models::{AttendanceRecord, Course};

pub fn parse_records(json: &str) -> anyhow::Result<Vec<AttendanceRecord>> {
    serde_json::from_str(json).context("invalid attendance record JSON")
}

pub fn parse_courses(json: &str) -> anyhow::Result<Vec<Course>> {
    serde_json::from_str(json).context("invalid course JSON")
}

pub fn load_records(path: &Path) -> anyhow::Result<Vec<AttendanceRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_records(&content).with_context(|| format!("in {}", path.display()))
}

pub fn load_courses(path: &Path) -> anyhow::Result<Vec<Course>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_courses(&content).with_context(|| format!("in {}", path.display()))
}
