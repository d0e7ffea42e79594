use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Event, EventCategory, EventStatus, Registration, RegistrationStatus, Student,
};
use crate::sources::MeritData;

/// Largest award a single registration may carry; mirrors the table CHECK.
pub const MAX_AWARD_POINTS: i32 = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub awarded: usize,
    pub skipped: usize,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ("A22CS0012", "Nur Aisyah Rahman", "Computing", 2022, "Software Engineering"),
        ("A22CS0047", "Brandon Lim Wei Jie", "Computing", 2022, "Data Engineering"),
        ("A23EE0105", "Chitra Devi Subramaniam", "Electrical Engineering", 2023, "Electronics"),
        ("A23MA0031", "Muhammad Farid Hakimi", "Management", 2023, "Accounting"),
    ];

    for (student_number, name, faculty, year, program) in students {
        sqlx::query(
            r#"
            INSERT INTO merit_tracker.students
            (id, student_number, full_name, faculty, enrollment_year, program)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_number) DO UPDATE
            SET full_name = EXCLUDED.full_name, faculty = EXCLUDED.faculty,
                enrollment_year = EXCLUDED.enrollment_year, program = EXCLUDED.program
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_number)
        .bind(name)
        .bind(faculty)
        .bind(year)
        .bind(program)
        .execute(pool)
        .await?;
    }

    let events = vec![
        (
            "Convocation Ushers",
            "Usher team for the 68th convocation ceremony",
            "Registrar Office",
            "Dewan Sultan Iskandar",
            "University",
            25,
            40,
            "Completed",
            NaiveDate::from_ymd_opt(2026, 9, 20).context("invalid date")?,
        ),
        (
            "Computing Industry Talk",
            "Talk series with local software companies",
            "Faculty of Computing",
            "N28 Auditorium",
            "Faculty",
            15,
            120,
            "Completed",
            NaiveDate::from_ymd_opt(2026, 10, 2).context("invalid date")?,
        ),
        (
            "Kolej Tun Dr Ismail Gotong-Royong",
            "Community clean-up around the residential college",
            "KTDI College Council",
            "KTDI",
            "College",
            8,
            60,
            "Completed",
            NaiveDate::from_ymd_opt(2026, 8, 14).context("invalid date")?,
        ),
        (
            "Robotics Club Build Night",
            "Line-follower robot build and race",
            "Robotics Club",
            "P19 Lab",
            "Association",
            10,
            30,
            "Ongoing",
            NaiveDate::from_ymd_opt(2026, 10, 16).context("invalid date")?,
        ),
        (
            "Inter-Faculty Futsal Cup",
            "Knockout futsal tournament",
            "Sports Unit",
            "Arena UTM",
            "Sports",
            12,
            80,
            "Upcoming",
            NaiveDate::from_ymd_opt(2026, 11, 7).context("invalid date")?,
        ),
    ];

    for (title, description, organizer, location, category, points, capacity, status, date) in
        events
    {
        sqlx::query(
            r#"
            INSERT INTO merit_tracker.events
            (id, title, description, organizer, location, category, points, capacity,
             status, event_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (title) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(organizer)
        .bind(location)
        .bind(category)
        .bind(points)
        .bind(capacity)
        .bind(status)
        .bind(date)
        .execute(pool)
        .await?;
    }

    let registrations = vec![
        ("A22CS0012", "Convocation Ushers", "Attended", true, 25),
        ("A22CS0012", "Computing Industry Talk", "Attended", true, 15),
        ("A22CS0047", "Convocation Ushers", "Attended", true, 10),
        ("A22CS0047", "Robotics Club Build Night", "Registered", false, 0),
        ("A23EE0105", "Kolej Tun Dr Ismail Gotong-Royong", "Attended", true, 8),
        ("A23EE0105", "Inter-Faculty Futsal Cup", "Waitlisted", false, 0),
        ("A23MA0031", "Computing Industry Talk", "Cancelled", false, 0),
    ];

    for (student_number, title, status, attended, points) in registrations {
        sqlx::query(
            r#"
            INSERT INTO merit_tracker.registrations
            (id, student_id, event_id, status, attendance_marked, points_awarded)
            SELECT $1, s.id, e.id, $2, $3, $4
            FROM merit_tracker.students s, merit_tracker.events e
            WHERE s.student_number = $5 AND e.title = $6
            ON CONFLICT (student_id, event_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(status)
        .bind(attended)
        .bind(points)
        .bind(student_number)
        .bind(title)
        .execute(pool)
        .await?;
    }

    let mut conn = pool.acquire().await?;
    refresh_counters(&mut conn).await
}

/// Recompute registered counts and cumulative merit from the registration log.
async fn refresh_counters(conn: &mut PgConnection) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE merit_tracker.events e
        SET registered_count = (
            SELECT COUNT(*) FROM merit_tracker.registrations r
            WHERE r.event_id = e.id AND r.status IN ($1, $2)
        )
        "#,
    )
    .bind(RegistrationStatus::Registered.as_str())
    .bind(RegistrationStatus::Attended.as_str())
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        UPDATE merit_tracker.students s
        SET total_merit = (
            SELECT COALESCE(SUM(r.points_awarded), 0) FROM merit_tracker.registrations r
            WHERE r.student_id = s.id AND r.attendance_marked
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<Student>> {
    let rows = sqlx::query(
        "SELECT id, student_number, full_name, faculty, enrollment_year, program, total_merit \
         FROM merit_tracker.students ORDER BY created_at, student_number",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Student {
            id: row.get("id"),
            student_number: row.get("student_number"),
            full_name: row.get("full_name"),
            faculty: row.get("faculty"),
            enrollment_year: row.get("enrollment_year"),
            program: row.get("program"),
            total_merit: row.get("total_merit"),
        })
        .collect())
}

fn event_from_row(row: PgRow) -> anyhow::Result<Event> {
    let status: String = row.get("status");
    let category: String = row.get("category");
    Ok(Event {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        organizer: row.get("organizer"),
        location: row.get("location"),
        category: EventCategory::parse(&category),
        points: row.get("points"),
        capacity: row.get("capacity"),
        registered_count: row.get("registered_count"),
        status: EventStatus::parse(&status)
            .with_context(|| format!("unknown event status {status:?}"))?,
        date: row.get("event_date"),
    })
}

pub async fn fetch_events(pool: &PgPool) -> anyhow::Result<Vec<Event>> {
    let rows = sqlx::query(
        "SELECT id, title, description, organizer, location, category, points, capacity, \
         registered_count, status, event_date \
         FROM merit_tracker.events ORDER BY event_date, title",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(event_from_row).collect()
}

pub async fn fetch_registrations(pool: &PgPool) -> anyhow::Result<Vec<Registration>> {
    let rows = sqlx::query(
        "SELECT id, student_id, event_id, status, attendance_marked, points_awarded, \
         registered_at FROM merit_tracker.registrations ORDER BY registered_at, id",
    )
    .fetch_all(pool)
    .await?;

    let mut registrations = Vec::with_capacity(rows.len());
    for row in rows {
        let status: String = row.get("status");
        registrations.push(Registration {
            id: row.get("id"),
            student_id: row.get("student_id"),
            event_id: row.get("event_id"),
            status: RegistrationStatus::parse(&status)
                .with_context(|| format!("unknown registration status {status:?}"))?,
            attendance_marked: row.get("attendance_marked"),
            points_awarded: row.get("points_awarded"),
            registered_at: row.get("registered_at"),
        });
    }

    Ok(registrations)
}

pub async fn load_merit_data(pool: &PgPool) -> anyhow::Result<MeritData> {
    let students = fetch_students(pool).await.context("failed to load students")?;
    let events = fetch_events(pool).await.context("failed to load events")?;
    let registrations = fetch_registrations(pool)
        .await
        .context("failed to load registrations")?;
    log::debug!(
        "loaded {} students, {} events, {} registrations",
        students.len(),
        events.len(),
        registrations.len()
    );
    Ok(MeritData::new(students, events, registrations))
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct AwardRow {
    pub student_number: String,
    pub event_title: String,
    pub points: i32,
}

impl AwardRow {
    fn points_in_range(&self) -> bool {
        (0..=MAX_AWARD_POINTS).contains(&self.points)
    }
}

/// Parse every row of a merit-award CSV
/// (`student_number,event_title,points`). Any malformed row fails the whole
/// file, so nothing is written for a partially valid upload.
pub fn read_award_rows<R: std::io::Read>(input: R) -> anyhow::Result<Vec<AwardRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<AwardRow>().enumerate() {
        // header is line 1
        let row = result.with_context(|| format!("invalid award on line {}", index + 2))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Apply a merit-award CSV in one transaction: each row marks attendance for
/// a student at an event and sets the points awarded.
pub async fn import_awards(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportOutcome> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_award_rows(file)?;
    let mut outcome = ImportOutcome::default();
    let mut tx = pool.begin().await?;

    for row in rows {
        if !row.points_in_range() {
            log::warn!(
                "skipping award of {} for {}: outside 0..={}",
                row.points,
                row.student_number,
                MAX_AWARD_POINTS
            );
            outcome.skipped += 1;
            continue;
        }

        let student_id: Option<Uuid> = sqlx::query(
            "SELECT id FROM merit_tracker.students WHERE student_number = $1",
        )
        .bind(&row.student_number)
        .fetch_optional(&mut *tx)
        .await?
        .map(|found| found.get("id"));

        let event_id: Option<Uuid> = sqlx::query(
            "SELECT id FROM merit_tracker.events WHERE lower(title) = lower($1)",
        )
        .bind(&row.event_title)
        .fetch_optional(&mut *tx)
        .await?
        .map(|found| found.get("id"));

        let (Some(student_id), Some(event_id)) = (student_id, event_id) else {
            log::warn!(
                "skipping award for {} at {:?}: unknown student or event",
                row.student_number,
                row.event_title
            );
            outcome.skipped += 1;
            continue;
        };

        sqlx::query(
            r#"
            INSERT INTO merit_tracker.registrations
            (id, student_id, event_id, status, attendance_marked, points_awarded)
            VALUES ($1, $2, $3, $4, TRUE, $5)
            ON CONFLICT (student_id, event_id) DO UPDATE
            SET status = EXCLUDED.status, attendance_marked = TRUE,
                points_awarded = EXCLUDED.points_awarded
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(event_id)
        .bind(RegistrationStatus::Attended.as_str())
        .bind(row.points)
        .execute(&mut *tx)
        .await?;

        outcome.awarded += 1;
    }

    refresh_counters(&mut tx).await?;
    tx.commit().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_trimmed_award_rows() {
        let input = "student_number,event_title,points\n A22CS0012 , Convocation Ushers ,25\nA23EE0105,Robotics Club Build Night,10\n";
        let rows = read_award_rows(input.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                AwardRow {
                    student_number: "A22CS0012".to_string(),
                    event_title: "Convocation Ushers".to_string(),
                    points: 25,
                },
                AwardRow {
                    student_number: "A23EE0105".to_string(),
                    event_title: "Robotics Club Build Night".to_string(),
                    points: 10,
                },
            ]
        );
    }

    #[test]
    fn one_bad_row_rejects_the_whole_file() {
        let input = "student_number,event_title,points\nA22CS0012,Convocation Ushers,25\nA22CS0047,Convocation Ushers,lots\n";
        let err = read_award_rows(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn award_points_are_bounded() {
        let row = |points| AwardRow {
            student_number: "A22CS0012".to_string(),
            event_title: "Ushers".to_string(),
            points,
        };
        assert!(row(0).points_in_range());
        assert!(row(MAX_AWARD_POINTS).points_in_range());
        assert!(!row(-1).points_in_range());
        assert!(!row(2_000_000_000).points_in_range());
    }
}
