use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub student_number: String,
    pub full_name: String,
    pub faculty: String,
    pub enrollment_year: i32,
    pub program: String,
    pub total_merit: i64,
}

/// Administrative tier an event awards merit under.
///
/// Legacy labels such as "Leadership" or "Sports" parse into `Other` and
/// still count towards a student's total, but not towards any tier bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventCategory {
    University,
    Faculty,
    College,
    Association,
    Other(OtherLabel),
}

/// Label of a non-tier category. Only [`EventCategory::parse`] creates one,
/// so it never holds a tier name or alias and survives a JSON round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OtherLabel(String);

impl OtherLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EventCategory {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "university" => EventCategory::University,
            "faculty" | "co-curricular" => EventCategory::Faculty,
            "college" | "community" => EventCategory::College,
            "association" | "club" => EventCategory::Association,
            _ => EventCategory::Other(OtherLabel(label.trim().to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventCategory::University => "University",
            EventCategory::Faculty => "Faculty",
            EventCategory::College => "College",
            EventCategory::Association => "Association",
            EventCategory::Other(label) => label.as_str(),
        }
    }
}

impl From<String> for EventCategory {
    fn from(value: String) -> Self {
        EventCategory::parse(&value)
    }
}

impl From<EventCategory> for String {
    fn from(value: EventCategory) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "upcoming" => Some(EventStatus::Upcoming),
            "ongoing" => Some(EventStatus::Ongoing),
            "completed" => Some(EventStatus::Completed),
            "cancelled" | "canceled" => Some(EventStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "Upcoming",
            EventStatus::Ongoing => "Ongoing",
            EventStatus::Completed => "Completed",
            EventStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub organizer: String,
    pub location: String,
    pub category: EventCategory,
    pub points: i32,
    pub capacity: i32,
    pub registered_count: i32,
    pub status: EventStatus,
    pub date: NaiveDate,
}

impl Event {
    pub fn seats_left(&self) -> i32 {
        (self.capacity - self.registered_count).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.seats_left() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    Registered,
    Waitlisted,
    Cancelled,
    Attended,
}

impl RegistrationStatus {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "registered" => Some(RegistrationStatus::Registered),
            "waitlisted" => Some(RegistrationStatus::Waitlisted),
            "cancelled" | "canceled" => Some(RegistrationStatus::Cancelled),
            "attended" => Some(RegistrationStatus::Attended),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "Registered",
            RegistrationStatus::Waitlisted => "Waitlisted",
            RegistrationStatus::Cancelled => "Cancelled",
            RegistrationStatus::Attended => "Attended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub student_id: Uuid,
    pub event_id: Uuid,
    pub status: RegistrationStatus,
    pub attendance_marked: bool,
    pub points_awarded: i32,
    pub registered_at: DateTime<Utc>,
}

/// Merit earned through one attended registration. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeritRecord {
    pub registration_id: Uuid,
    pub student_id: Uuid,
    pub event_id: Uuid,
    pub category: EventCategory,
    pub description: String,
    pub date: NaiveDate,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeritSummary {
    pub student_id: Uuid,
    pub total_points: i64,
    pub university_merit: i64,
    pub faculty_merit: i64,
    pub college_merit: i64,
    pub association_merit: i64,
    pub recent_activities: usize,
    /// 1-based position by total points; `None` when the student is not
    /// part of the population.
    pub rank: Option<usize>,
    pub total_students: usize,
    pub target_points: i32,
    pub progress_percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub student_id: Uuid,
    pub student_number: String,
    pub full_name: String,
    pub faculty: String,
    pub university_merit: i64,
    pub faculty_merit: i64,
    pub college_merit: i64,
    pub association_merit: i64,
    pub total_points: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Total,
    University,
    Faculty,
    College,
    Association,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Total => "total",
            SortKey::University => "university",
            SortKey::Faculty => "faculty",
            SortKey::College => "college",
            SortKey::Association => "association",
        }
    }
}

/// Unknown keys fall back to `Total`.
impl From<&str> for SortKey {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "university" => SortKey::University,
            "faculty" => SortKey::Faculty,
            "college" => SortKey::College,
            "association" => SortKey::Association,
            _ => SortKey::Total,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    pub status: Option<EventStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub has_cache: bool,
    pub is_valid: bool,
    pub age_ms: i64,
    pub remaining_ms: i64,
}
