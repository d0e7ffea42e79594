use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::merit;
use crate::models::{MeritRecord, SortKey};
use crate::sources::MeritData;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMix {
    pub category: String,
    pub awards: usize,
    pub points: i64,
}

pub fn summarize_by_category(records: &[MeritRecord]) -> Vec<CategoryMix> {
    let mut map: HashMap<String, (usize, i64)> = HashMap::new();

    for record in records {
        let entry = map.entry(record.category.to_string()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += i64::from(record.points);
    }

    let mut mix: Vec<CategoryMix> = map
        .into_iter()
        .map(|(category, (awards, points))| CategoryMix {
            category,
            awards,
            points,
        })
        .collect();

    mix.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.category.cmp(&b.category)));
    mix
}

pub fn build_report(data: &MeritData, sort_key: SortKey, limit: usize, today: NaiveDate) -> String {
    let records = merit::derive_merit_records(data);
    let mix = summarize_by_category(&records);
    let board = merit::leaderboard(data, sort_key);

    let mut output = String::new();

    let _ = writeln!(output, "# Merit Points Report");
    let _ = writeln!(
        output,
        "Generated on {} for {} students ({} merit awards)",
        today,
        data.list_students().len(),
        records.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Category Mix");

    if mix.is_empty() {
        let _ = writeln!(output, "No merit awarded yet.");
    } else {
        for entry in &mix {
            let _ = writeln!(
                output,
                "- {}: {} points across {} awards",
                entry.category, entry.points, entry.awards
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Leaderboard (by {})", sort_key.as_str());

    if board.is_empty() {
        let _ = writeln!(output, "No students registered.");
    } else {
        let _ = writeln!(
            output,
            "| Rank | Student | Faculty | University | Faculty pts | College | Association | Total |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
        for (index, entry) in board.iter().take(limit).enumerate() {
            let _ = writeln!(
                output,
                "| {} | {} ({}) | {} | {} | {} | {} | {} | {} |",
                index + 1,
                entry.full_name,
                entry.student_number,
                entry.faculty,
                entry.university_merit,
                entry.faculty_merit,
                entry.college_merit,
                entry.association_merit,
                entry.total_points
            );
        }
    }

    let mut recent = records;
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Merit Awards");

    if recent.is_empty() {
        let _ = writeln!(output, "No merit awarded yet.");
    } else {
        for record in recent.iter().take(5) {
            let student = data
                .student_by_id(record.student_id)
                .map_or("unknown student", |student| student.full_name.as_str());
            let event = data
                .event_by_id(record.event_id)
                .map_or(record.description.as_str(), |event| event.title.as_str());
            let _ = writeln!(
                output,
                "- {} earned {} {} points on {}: {}",
                student, record.points, record.category, record.date, event
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventCategory;
    use crate::testutil::{attended, date, event, student};

    fn sample() -> MeritData {
        let a = student("A22CS0012", "Nur Aisyah");
        let b = student("A22CS0047", "Brandon Lim");
        let talk = event("Industry Talk", EventCategory::Faculty, 15, date(2026, 10, 2));
        let ushers = event("Ushers", EventCategory::University, 25, date(2026, 9, 20));
        let registrations = vec![
            attended(&a, &ushers, 25),
            attended(&a, &talk, 15),
            attended(&b, &talk, 15),
        ];
        MeritData::new(vec![a, b], vec![talk, ushers], registrations)
    }

    #[test]
    fn category_mix_sorted_by_points() {
        let records = merit::derive_merit_records(&sample());
        let mix = summarize_by_category(&records);
        assert_eq!(mix.len(), 2);
        assert_eq!(mix[0].category, "Faculty");
        assert_eq!(mix[0].points, 30);
        assert_eq!(mix[0].awards, 2);
        assert_eq!(mix[1].category, "University");
    }

    #[test]
    fn report_lists_leaders_and_recent_awards() {
        let report = build_report(&sample(), SortKey::Total, 10, date(2026, 10, 18));
        assert!(report.contains("Generated on 2026-10-18 for 2 students (3 merit awards)"));
        assert!(report.contains("| 1 | Nur Aisyah (A22CS0012) | Computing | 25 | 15 | 0 | 0 | 40 |"));
        assert!(report.contains("| 2 | Brandon Lim (A22CS0047)"));
        assert!(report.contains("## Leaderboard (by total)"));
        assert!(report.contains("- Nur Aisyah earned 15 Faculty points on 2026-10-02: Industry Talk"));
    }

    #[test]
    fn empty_data_renders_placeholders() {
        let report = build_report(&MeritData::default(), SortKey::College, 5, date(2026, 10, 18));
        assert!(report.contains("No merit awarded yet."));
        assert!(report.contains("No students registered."));
    }
}
