use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    Event, EventCategory, LeaderboardEntry, MeritRecord, MeritSummary, SortKey,
};
use crate::sources::MeritData;

pub const TARGET_POINTS: i32 = 50;
pub const RECENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CategoryTotals {
    university: i64,
    faculty: i64,
    college: i64,
    association: i64,
    total: i64,
}

impl CategoryTotals {
    fn add(&mut self, category: &EventCategory, points: i32) {
        let points = i64::from(points);
        match category {
            EventCategory::University => self.university += points,
            EventCategory::Faculty => self.faculty += points,
            EventCategory::College => self.college += points,
            EventCategory::Association => self.association += points,
            EventCategory::Other(_) => {}
        }
        self.total += points;
    }

    fn get(&self, key: SortKey) -> i64 {
        match key {
            SortKey::Total => self.total,
            SortKey::University => self.university,
            SortKey::Faculty => self.faculty,
            SortKey::College => self.college,
            SortKey::Association => self.association,
        }
    }
}

fn totals_for(records: &[MeritRecord], student_id: Uuid) -> CategoryTotals {
    let mut totals = CategoryTotals::default();
    for record in records.iter().filter(|record| record.student_id == student_id) {
        totals.add(&record.category, record.points);
    }
    totals
}

/// Merit records for every attended registration that awarded points,
/// in registration order.
pub fn derive_merit_records(data: &MeritData) -> Vec<MeritRecord> {
    let events: HashMap<Uuid, &Event> = data
        .list_events()
        .iter()
        .map(|event| (event.id, event))
        .collect();
    let mut records = Vec::new();

    for registration in data.list_registrations() {
        if !registration.attendance_marked || registration.points_awarded <= 0 {
            continue;
        }

        let Some(event) = events.get(&registration.event_id) else {
            log::debug!(
                "registration {} references unknown event {}, skipping",
                registration.id,
                registration.event_id
            );
            continue;
        };

        records.push(MeritRecord {
            registration_id: registration.id,
            student_id: registration.student_id,
            event_id: event.id,
            category: event.category.clone(),
            description: event.description.clone(),
            date: event.date,
            points: registration.points_awarded,
        });
    }

    records
}

pub fn summarize_for_student(data: &MeritData, student_id: Uuid) -> MeritSummary {
    summarize_for_student_at(data, student_id, Utc::now().date_naive())
}

pub fn summarize_for_student_at(
    data: &MeritData,
    student_id: Uuid,
    today: NaiveDate,
) -> MeritSummary {
    let records = derive_merit_records(data);
    let totals = totals_for(&records, student_id);

    let cutoff = today - Duration::days(RECENT_WINDOW_DAYS);
    let recent_activities = records
        .iter()
        .filter(|record| record.student_id == student_id && record.date >= cutoff)
        .count();

    let mut population: Vec<(Uuid, i64)> = data
        .list_students()
        .iter()
        .map(|student| (student.id, totals_for(&records, student.id).total))
        .collect();
    // stable: equal totals keep directory order
    population.sort_by_key(|(_, total)| Reverse(*total));
    let rank = population
        .iter()
        .position(|(id, _)| *id == student_id)
        .map(|index| index + 1);

    MeritSummary {
        student_id,
        total_points: totals.total,
        university_merit: totals.university,
        faculty_merit: totals.faculty,
        college_merit: totals.college,
        association_merit: totals.association,
        recent_activities,
        rank,
        total_students: population.len(),
        target_points: TARGET_POINTS,
        progress_percentage: progress_percentage(totals.total),
    }
}

pub fn progress_percentage(total_points: i64) -> i64 {
    (total_points as f64 / f64::from(TARGET_POINTS) * 100.0).round() as i64
}

/// Whole population ordered by `sort_key`, descending. Ties keep directory
/// order; display rank is the 1-based position in the returned list.
pub fn leaderboard(data: &MeritData, sort_key: SortKey) -> Vec<LeaderboardEntry> {
    let records = derive_merit_records(data);
    let mut rows: Vec<(CategoryTotals, LeaderboardEntry)> = data
        .list_students()
        .iter()
        .map(|student| {
            let totals = totals_for(&records, student.id);
            let entry = LeaderboardEntry {
                student_id: student.id,
                student_number: student.student_number.clone(),
                full_name: student.full_name.clone(),
                faculty: student.faculty.clone(),
                university_merit: totals.university,
                faculty_merit: totals.faculty,
                college_merit: totals.college,
                association_merit: totals.association,
                total_points: totals.total,
            };
            (totals, entry)
        })
        .collect();

    rows.sort_by_key(|(totals, _)| Reverse(totals.get(sort_key)));
    rows.into_iter().map(|(_, entry)| entry).collect()
}
