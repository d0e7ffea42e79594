use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::models::{
    Event, EventCategory, EventStatus, Registration, RegistrationStatus, Student,
};

pub fn student(student_number: &str, full_name: &str) -> Student {
    Student {
        id: Uuid::new_v4(),
        student_number: student_number.to_string(),
        full_name: full_name.to_string(),
        faculty: "Computing".to_string(),
        enrollment_year: 2023,
        program: "Software Engineering".to_string(),
        total_merit: 0,
    }
}

pub fn event(title: &str, category: EventCategory, points: i32, date: NaiveDate) -> Event {
    Event {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: format!("{title} description"),
        organizer: "Student Affairs".to_string(),
        location: "Main Hall".to_string(),
        category,
        points,
        capacity: 100,
        registered_count: 0,
        status: EventStatus::Completed,
        date,
    }
}

pub fn attended(student: &Student, event: &Event, points: i32) -> Registration {
    Registration {
        id: Uuid::new_v4(),
        student_id: student.id,
        event_id: event.id,
        status: RegistrationStatus::Attended,
        attendance_marked: true,
        points_awarded: points,
        registered_at: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
    }
}

pub fn registered(student: &Student, event: &Event) -> Registration {
    Registration {
        status: RegistrationStatus::Registered,
        attendance_marked: false,
        points_awarded: 0,
        ..attended(student, event, 0)
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}
