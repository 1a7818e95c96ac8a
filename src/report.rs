use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{AttendanceSummary, CourseSummary};

pub fn courses_needing_attention(summary: &AttendanceSummary) -> Vec<&CourseSummary> {
    let mut flagged: Vec<&CourseSummary> = summary
        .courses
        .iter()
        .filter(|course| course.status.needs_attention())
        .collect();

    flagged.sort_by(|a, b| a.percentage.cmp(&b.percentage));
    flagged
}

pub fn build_report(student: &str, as_of: NaiveDate, summary: &AttendanceSummary) -> String {
    let overall = &summary.overall;
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(output, "Generated for {} (as of {})", student, as_of);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    if overall.total_classes == 0 {
        let _ = writeln!(output, "No attendance recorded for enrolled courses.");
        return output;
    }

    let _ = writeln!(
        output,
        "- Attended {} of {} classes ({}%, {})",
        overall.attended,
        overall.total_classes,
        overall.percentage,
        crate::attendance::classify(overall.percentage)
    );
    let _ = writeln!(output, "- Two-week trend: {}", overall.trend);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses");
    let _ = writeln!(output, "| Course | Attended | Total | Rate | Status |");
    let _ = writeln!(output, "|---|---|---|---|---|");
    for course in summary.courses.iter() {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {}% | {} |",
            course.name, course.attended, course.total_classes, course.percentage, course.status
        );
    }

    let flagged = courses_needing_attention(summary);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");

    if flagged.is_empty() {
        let _ = writeln!(output, "All courses are at 80% attendance or better.");
    } else {
        for course in flagged {
            let _ = writeln!(
                output,
                "- {} at {}% ({})",
                course.name, course.percentage, course.status
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Classes");
    for course in summary.courses.iter() {
        let recent: Vec<String> = course
            .recent_classes
            .iter()
            .map(|class| format!("{} {}", class.date, class.status))
            .collect();
        let _ = writeln!(output, "- {}: {}", course.name, recent.join(", "));
    }

    output
}

/// Fixed-width course table for terminal output.
pub fn render_table(summary: &AttendanceSummary) -> String {
    let overall = &summary.overall;
    let mut output = String::new();

    if summary.courses.is_empty() {
        let _ = writeln!(output, "No attendance recorded for enrolled courses.");
        return output;
    }

    let width = summary
        .courses
        .iter()
        .map(|course| course.name.len())
        .max()
        .unwrap_or(0)
        .max("Overall".len());

    for course in summary.courses.iter() {
        let _ = writeln!(
            output,
            "{:<width$}  {:>4}/{:<4} {:>3}%  {}",
            course.name,
            course.attended,
            course.total_classes,
            course.percentage,
            course.status,
            width = width
        );
    }
    let _ = writeln!(
        output,
        "{:<width$}  {:>4}/{:<4} {:>3}%  trend {}",
        "Overall",
        overall.attended,
        overall.total_classes,
        overall.percentage,
        overall.trend,
        width = width
    );

    output
}
