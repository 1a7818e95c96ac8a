use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

use crate::models::{
    AttendanceRecord, AttendanceSummary, Course, CourseSummary, OverallSummary, RecentClass,
    StatusTier, Trend,
};

pub const RECENT_CLASS_LIMIT: usize = 5;
pub const TREND_WINDOW_DAYS: i64 = 14;

struct CourseTally<'a> {
    course: &'a Course,
    total_classes: u32,
    attended: u32,
    recent: Vec<RecentClass>,
}

/// Builds the per-course and overall attendance summary for one student.
///
/// Records whose `course_id` is not in `courses` are dropped. Courses with no
/// records are left out of `courses` in the result but keep their relative
/// order otherwise. `as_of` anchors the trend windows.
pub fn aggregate(
    records: &[AttendanceRecord],
    courses: &[Course],
    as_of: NaiveDate,
) -> AttendanceSummary {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(courses.len());
    let mut tallies: Vec<CourseTally> = Vec::with_capacity(courses.len());

    for course in courses {
        index.entry(course.id.as_str()).or_insert_with(|| {
            tallies.push(CourseTally {
                course,
                total_classes: 0,
                attended: 0,
                recent: Vec::new(),
            });
            tallies.len() - 1
        });
    }

    let mut tracked: Vec<&AttendanceRecord> = Vec::with_capacity(records.len());
    for record in records {
        let Some(&slot) = index.get(record.course_id.as_str()) else {
            continue;
        };
        let tally = &mut tallies[slot];
        tally.total_classes += 1;
        if record.status.is_present() {
            tally.attended += 1;
        }
        tally.recent.push(RecentClass {
            date: record.date,
            status: record.status,
        });
        tracked.push(record);
    }

    let mut total_classes = 0;
    let mut attended = 0;
    let mut summaries = Vec::new();

    for mut tally in tallies {
        if tally.total_classes == 0 {
            continue;
        }
        total_classes += tally.total_classes;
        attended += tally.attended;

        let percent = percentage(tally.attended, tally.total_classes);
        tally.recent.sort_by(|a, b| b.date.cmp(&a.date));
        tally.recent.truncate(RECENT_CLASS_LIMIT);

        summaries.push(CourseSummary {
            id: tally.course.id.clone(),
            name: tally.course.name.clone(),
            total_classes: tally.total_classes,
            attended: tally.attended,
            percentage: percent,
            status: classify(percent),
            recent_classes: tally.recent,
        });
    }

    AttendanceSummary {
        overall: OverallSummary {
            total_classes,
            attended,
            percentage: percentage(attended, total_classes),
            trend: trend(tracked.into_iter(), as_of),
        },
        courses: summaries,
    }
}

/// `round(attended / total * 100)`, or 0 when nothing was held.
pub fn percentage(attended: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let attended = u64::from(attended);
    let total = u64::from(total);
    // half rounds up
    ((attended * 200 + total) / (total * 2)) as u32
}

/// | Range   | Tier      |
/// |---------|-----------|
/// | >= 90   | excellent |
/// | >= 80   | good      |
/// | >= 70   | warning   |
/// | < 70    | critical  |
pub fn classify(percentage: u32) -> StatusTier {
    match percentage {
        p if p >= 90 => StatusTier::Excellent,
        p if p >= 80 => StatusTier::Good,
        p if p >= 70 => StatusTier::Warning,
        _ => StatusTier::Critical,
    }
}

/// Presence rate over the 14 days up to `as_of` minus the rate over the 14
/// days before that. Records dated after `as_of` count toward the recent
/// window.
pub fn trend<'a, I>(records: I, as_of: NaiveDate) -> Trend
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let recent_start = as_of - Duration::days(TREND_WINDOW_DAYS);
    let older_start = as_of - Duration::days(TREND_WINDOW_DAYS * 2);

    let mut recent = (0u32, 0u32);
    let mut older = (0u32, 0u32);

    for record in records {
        let window = if record.date >= recent_start {
            &mut recent
        } else if record.date >= older_start {
            &mut older
        } else {
            continue;
        };
        window.1 += 1;
        if record.status.is_present() {
            window.0 += 1;
        }
    }

    Trend(present_rate(recent) - present_rate(older))
}

fn present_rate((present, total): (u32, u32)) -> f64 {
    if total == 0 {
        0.0
    } else {
        present as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(course_id: &str, date: NaiveDate, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            course_id: course_id.to_string(),
            date,
            status,
        }
    }

    fn course(id: &str, name: &str) -> Course {
        Course {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn tiers_follow_thresholds() {
        assert_eq!(classify(100), StatusTier::Excellent);
        assert_eq!(classify(90), StatusTier::Excellent);
        assert_eq!(classify(89), StatusTier::Good);
        assert_eq!(classify(80), StatusTier::Good);
        assert_eq!(classify(79), StatusTier::Warning);
        assert_eq!(classify(70), StatusTier::Warning);
        assert_eq!(classify(69), StatusTier::Critical);
        assert_eq!(classify(0), StatusTier::Critical);
        assert_ne!(classify(89), StatusTier::Warning);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(7, 7), 100);
    }

    #[test]
    fn summarizes_single_course() {
        let courses = vec![course("C1", "Math")];
        let records = vec![
            record("C1", day(2024, 1, 1), AttendanceStatus::Present),
            record("C1", day(2024, 1, 2), AttendanceStatus::Absent),
        ];

        let summary = aggregate(&records, &courses, day(2024, 1, 3));
        assert_eq!(summary.courses.len(), 1);
        let math = &summary.courses[0];
        assert_eq!(math.total_classes, 2);
        assert_eq!(math.attended, 1);
        assert_eq!(math.percentage, 50);
        assert_eq!(math.status, StatusTier::Critical);
        assert_eq!(math.recent_classes[0].date, day(2024, 1, 2));
        assert_eq!(summary.overall.total_classes, 2);
        assert_eq!(summary.overall.percentage, 50);
    }

    #[test]
    fn drops_records_for_unknown_courses() {
        let records = vec![record("X", day(2024, 1, 1), AttendanceStatus::Present)];
        let summary = aggregate(&records, &[], day(2024, 1, 2));
        assert_eq!(summary.overall.total_classes, 0);
        assert_eq!(summary.overall.attended, 0);
        assert_eq!(summary.overall.percentage, 0);
        assert_eq!(summary.overall.trend.to_string(), "+0%");
        assert!(summary.courses.is_empty());
    }

    #[test]
    fn excludes_courses_without_records_and_keeps_order() {
        let courses = vec![
            course("C3", "History"),
            course("C1", "Math"),
            course("C2", "Biology"),
        ];
        let records = vec![
            record("C2", day(2024, 2, 1), AttendanceStatus::Present),
            record("C3", day(2024, 2, 1), AttendanceStatus::Late),
        ];

        let summary = aggregate(&records, &courses, day(2024, 2, 2));
        let ids: Vec<&str> = summary.courses.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C3", "C2"]);
        assert_eq!(summary.courses[0].attended, 0);
        assert_eq!(summary.courses[1].percentage, 100);
    }

    #[test]
    fn recent_classes_are_newest_first_and_capped() {
        let courses = vec![course("C1", "Math")];
        let records: Vec<AttendanceRecord> = [3, 9, 1, 7, 5, 2, 8]
            .iter()
            .map(|d| record("C1", day(2024, 3, *d), AttendanceStatus::Present))
            .collect();

        let summary = aggregate(&records, &courses, day(2024, 3, 10));
        let dates: Vec<u32> = summary.courses[0]
            .recent_classes
            .iter()
            .map(|c| chrono::Datelike::day(&c.date))
            .collect();
        assert_eq!(dates, vec![9, 8, 7, 5, 3]);
        assert_eq!(summary.courses[0].total_classes, 7);
    }

    #[test]
    fn duplicate_entries_both_count() {
        let courses = vec![course("C1", "Math")];
        let records = vec![
            record("C1", day(2024, 1, 1), AttendanceStatus::Present),
            record("C1", day(2024, 1, 1), AttendanceStatus::Present),
        ];
        let summary = aggregate(&records, &courses, day(2024, 1, 2));
        assert_eq!(summary.courses[0].total_classes, 2);
        assert_eq!(summary.courses[0].attended, 2);
    }

    #[test]
    fn duplicate_course_ids_keep_first_entry() {
        let courses = vec![course("C1", "Math"), course("C1", "Algebra")];
        let records = vec![record("C1", day(2024, 1, 1), AttendanceStatus::Absent)];
        let summary = aggregate(&records, &courses, day(2024, 1, 2));
        assert_eq!(summary.courses.len(), 1);
        assert_eq!(summary.courses[0].name, "Math");
    }

    #[test]
    fn overall_sums_across_courses() {
        let courses = vec![course("C1", "Math"), course("C2", "Biology")];
        let mut records = Vec::new();
        for d in 1..=9 {
            records.push(record("C1", day(2024, 4, d), AttendanceStatus::Present));
        }
        records.push(record("C1", day(2024, 4, 10), AttendanceStatus::Absent));
        records.push(record("C2", day(2024, 4, 10), AttendanceStatus::Present));
        records.push(record("C2", day(2024, 4, 11), AttendanceStatus::Excused));

        let summary = aggregate(&records, &courses, day(2024, 4, 12));
        assert_eq!(summary.courses[0].percentage, 90);
        assert_eq!(summary.courses[0].status, StatusTier::Excellent);
        assert_eq!(summary.courses[1].percentage, 50);
        assert_eq!(summary.overall.total_classes, 12);
        assert_eq!(summary.overall.attended, 10);
        assert_eq!(summary.overall.percentage, 83);
        for c in &summary.courses {
            assert!(c.attended <= c.total_classes);
        }
    }

    #[test]
    fn trend_is_zero_without_records_in_windows() {
        let as_of = day(2024, 6, 1);
        let records = vec![record("C1", day(2024, 1, 1), AttendanceStatus::Present)];
        assert_eq!(trend(&records, as_of).to_string(), "+0%");
        assert_eq!(trend(Vec::<AttendanceRecord>::new().iter(), as_of), Trend(0.0));
    }

    #[test]
    fn trend_compares_two_week_windows() {
        let as_of = day(2024, 6, 29);
        let records = vec![
            // recent: 2 of 2 present
            record("C1", day(2024, 6, 28), AttendanceStatus::Present),
            record("C1", day(2024, 6, 15), AttendanceStatus::Present),
            // older: 1 of 4 present
            record("C1", day(2024, 6, 14), AttendanceStatus::Present),
            record("C1", day(2024, 6, 10), AttendanceStatus::Absent),
            record("C1", day(2024, 6, 5), AttendanceStatus::Absent),
            record("C1", day(2024, 6, 1), AttendanceStatus::Late),
            // outside both windows
            record("C1", day(2024, 5, 31), AttendanceStatus::Absent),
        ];

        let t = trend(&records, as_of);
        assert!((t.points() - 75.0).abs() < 1e-9);
        assert_eq!(t.to_string(), "+75%");
    }

    #[test]
    fn trend_is_negative_when_recent_rate_drops() {
        let as_of = day(2024, 6, 29);
        let records = vec![
            record("C1", day(2024, 6, 20), AttendanceStatus::Absent),
            record("C1", day(2024, 6, 21), AttendanceStatus::Present),
            record("C1", day(2024, 6, 22), AttendanceStatus::Absent),
            record("C1", day(2024, 6, 3), AttendanceStatus::Present),
        ];
        assert_eq!(trend(&records, as_of).to_string(), "-67%");
    }

    #[test]
    fn trend_ignores_untracked_courses() {
        let as_of = day(2024, 6, 29);
        let courses = vec![course("C1", "Math")];
        let records = vec![
            record("C1", day(2024, 6, 28), AttendanceStatus::Present),
            record("GHOST", day(2024, 6, 27), AttendanceStatus::Absent),
        ];
        let summary = aggregate(&records, &courses, as_of);
        assert_eq!(summary.overall.trend.to_string(), "+100%");
    }
}
