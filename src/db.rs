use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use groupscholar_attendance_summary::models::{AttendanceRecord, AttendanceStatus, Course};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_student(
    pool: &PgPool,
    id: Uuid,
    full_name: &str,
    email: &str,
    cohort: &str,
) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        r#"
        INSERT INTO attendance_dashboard.students (id, full_name, email, cohort)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name, cohort = EXCLUDED.cohort
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(email)
    .bind(cohort)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

async fn upsert_course(pool: &PgPool, id: &str, name: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO attendance_dashboard.courses (id, name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .bind(id)
    .bind(name)
    .execute(pool)
    .await?;
    Ok(())
}

async fn enroll(pool: &PgPool, student_id: Uuid, course_id: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO attendance_dashboard.enrollments (student_id, course_id, position)
        SELECT $1, $2, COALESCE(MAX(position) + 1, 0)
        FROM attendance_dashboard.enrollments
        WHERE student_id = $1
        ON CONFLICT (student_id, course_id) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_record(
    pool: &PgPool,
    student_id: Uuid,
    course_id: &str,
    class_date: NaiveDate,
    status: AttendanceStatus,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_dashboard.attendance_records
        (id, student_id, course_id, class_date, status, source_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(course_id)
    .bind(class_date)
    .bind(status.as_str())
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "avery.lee@groupscholar.com",
            "2026",
            "PPPPAPPPPPPP",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "jules.moreno@groupscholar.com",
            "2025",
            "AAPLAPPPPPPE",
        ),
    ];
    let courses = vec![
        ("MATH-201", "Linear Algebra"),
        ("BIO-110", "Cell Biology"),
        ("HIST-150", "World History"),
    ];

    for (id, name) in &courses {
        upsert_course(pool, id, name).await?;
    }

    let today = Utc::now().date_naive();
    let mut inserted = 0usize;

    for (id, name, email, cohort, pattern) in students {
        let student_id = upsert_student(pool, id, name, email, cohort).await?;

        for (offset, (course_id, _)) in courses.iter().enumerate() {
            enroll(pool, student_id, course_id).await?;

            // newest class first; one class every three days per course
            for (n, code) in pattern.chars().enumerate() {
                let class_date = today - Duration::days((n * 3 + offset) as i64);
                let status = match code {
                    'P' => AttendanceStatus::Present,
                    'A' => AttendanceStatus::Absent,
                    'L' => AttendanceStatus::Late,
                    _ => AttendanceStatus::Excused,
                };
                let source_key = format!("seed-{email}-{course_id}-{n}");
                if insert_record(pool, student_id, course_id, class_date, status, &source_key)
                    .await?
                {
                    inserted += 1;
                }
            }
        }
    }

    info!(inserted, "seed data loaded");
    Ok(inserted)
}

pub async fn find_student(pool: &PgPool, email: &str) -> anyhow::Result<(Uuid, String)> {
    let row = sqlx::query(
        "SELECT id, full_name FROM attendance_dashboard.students WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no student with email {email}"))?;

    Ok((row.get("id"), row.get("full_name")))
}

pub async fn fetch_attendance(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(
        "SELECT course_id, class_date, status \
         FROM attendance_dashboard.attendance_records \
         WHERE student_id = $1 \
         ORDER BY class_date",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
    .context("failed to load attendance records")?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let status: String = row.get("status");
        records.push(AttendanceRecord {
            course_id: row.get("course_id"),
            date: row.get("class_date"),
            status: AttendanceStatus::from(status.as_str()),
        });
    }

    debug!(%student_id, count = records.len(), "attendance records fetched");
    Ok(records)
}

pub async fn fetch_courses(pool: &PgPool, student_id: Uuid) -> anyhow::Result<Vec<Course>> {
    let rows = sqlx::query(
        "SELECT c.id, c.name \
         FROM attendance_dashboard.enrollments e \
         JOIN attendance_dashboard.courses c ON c.id = e.course_id \
         WHERE e.student_id = $1 \
         ORDER BY e.position, c.id",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
    .context("failed to load enrolled courses")?;

    let courses: Vec<Course> = rows
        .into_iter()
        .map(|row| Course {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect();

    debug!(%student_id, count = courses.len(), "enrolled courses fetched");
    Ok(courses)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        email: String,
        full_name: String,
        cohort: String,
        course_id: String,
        course_name: String,
        class_date: NaiveDate,
        status: String,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("bad CSV row {}", line + 2))?;
        let student_id =
            upsert_student(pool, Uuid::new_v4(), &row.full_name, &row.email, &row.cohort).await?;
        upsert_course(pool, &row.course_id, &row.course_name).await?;
        enroll(pool, student_id, &row.course_id).await?;

        let source_key = row
            .source_key
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_record(
            pool,
            student_id,
            &row.course_id,
            row.class_date,
            AttendanceStatus::from(row.status.as_str()),
            &source_key,
        )
        .await?
        {
            inserted += 1;
        }
    }

    info!(inserted, path = %csv_path.display(), "attendance CSV imported");
    Ok(inserted)
}
