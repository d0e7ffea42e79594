use uuid::Uuid;

use crate::models::{Event, Registration, Student};

/// Read-only snapshot of the student directory, event catalog and
/// registration log that merit is derived from.
#[derive(Debug, Clone, Default)]
pub struct MeritData {
    students: Vec<Student>,
    events: Vec<Event>,
    registrations: Vec<Registration>,
}

impl MeritData {
    pub fn new(
        students: Vec<Student>,
        events: Vec<Event>,
        registrations: Vec<Registration>,
    ) -> Self {
        Self {
            students,
            events,
            registrations,
        }
    }

    pub fn student_by_id(&self, id: Uuid) -> Option<&Student> {
        self.students.iter().find(|student| student.id == id)
    }

    pub fn student_by_number(&self, student_number: &str) -> Option<&Student> {
        self.students
            .iter()
            .find(|student| student.student_number.eq_ignore_ascii_case(student_number))
    }

    pub fn list_students(&self) -> &[Student] {
        &self.students
    }

    pub fn event_by_id(&self, id: Uuid) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn list_events(&self) -> &[Event] {
        &self.events
    }

    pub fn list_registrations(&self) -> &[Registration] {
        &self.registrations
    }
}
