use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::errors::{FeeError, Result};
use crate::types::{BatchId, CourseId, MonthId, StudentId};

/// a student's link to a course, bounded by months (inclusive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub course_id: CourseId,
    pub starting_month_id: Option<MonthId>,
    /// absent means open-ended
    pub ending_month_id: Option<MonthId>,
}

impl Enrollment {
    pub fn open_ended(course_id: CourseId, starting_month_id: MonthId) -> Self {
        Self {
            course_id,
            starting_month_id: Some(starting_month_id),
            ending_month_id: None,
        }
    }

    pub fn bounded(course_id: CourseId, starting_month_id: MonthId, ending_month_id: MonthId) -> Self {
        Self {
            course_id,
            starting_month_id: Some(starting_month_id),
            ending_month_id: Some(ending_month_id),
        }
    }
}

/// student record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    /// human-facing code printed on invoices
    pub student_code: String,
    pub name: String,
    pub phone: Option<String>,
    pub batch_id: Option<BatchId>,
    pub institution: Option<String>,
    pub enrollments: Vec<Enrollment>,
}

impl Student {
    pub fn new(student_code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_code: student_code.into(),
            name: name.into(),
            phone: None,
            batch_id: None,
            institution: None,
            enrollments: Vec::new(),
        }
    }

    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_enrollment(mut self, enrollment: Enrollment) -> Self {
        self.enrollments.push(enrollment);
        self
    }
}

/// check the enrollment invariant against the catalog
pub fn validate_enrollment(enrollment: &Enrollment, catalog: &Catalog) -> Result<()> {
    let course = catalog
        .course(enrollment.course_id)
        .ok_or_else(|| FeeError::validation(format!("unknown course {}", enrollment.course_id)))?;

    let bound = |month_id: Option<MonthId>, label: &str| -> Result<Option<u32>> {
        let Some(month_id) = month_id else {
            return Ok(None);
        };
        let month = catalog
            .month(month_id)
            .ok_or_else(|| FeeError::validation(format!("unknown {} month {}", label, month_id)))?;
        if month.course_id != course.id {
            return Err(FeeError::validation(format!(
                "{} month '{}' does not belong to course '{}'",
                label, month.name, course.name
            )));
        }
        Ok(Some(month.month_number))
    };

    let start = bound(enrollment.starting_month_id, "starting")?;
    let end = bound(enrollment.ending_month_id, "ending")?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(FeeError::validation(format!(
                "ending month number {} precedes starting month number {}",
                end, start
            )));
        }
    }
    Ok(())
}

/// student records, insertion ordered
#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: Vec<Student>,
    index: HashMap<StudentId, usize>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_student(&mut self, student: Student, catalog: &Catalog) -> Result<StudentId> {
        if self.index.contains_key(&student.id) {
            return Err(FeeError::validation(format!("student {} already exists", student.id)));
        }
        if student.student_code.trim().is_empty() {
            return Err(FeeError::validation("student code must not be empty"));
        }
        if self.find_by_code(&student.student_code).is_some() {
            return Err(FeeError::validation(format!(
                "student code '{}' already in use",
                student.student_code
            )));
        }
        if let Some(batch_id) = student.batch_id {
            if catalog.batch(batch_id).is_none() {
                return Err(FeeError::validation(format!("unknown batch {}", batch_id)));
            }
        }
        for enrollment in &student.enrollments {
            validate_enrollment(enrollment, catalog)?;
        }

        let id = student.id;
        self.index.insert(id, self.students.len());
        self.students.push(student);
        Ok(id)
    }

    /// append an enrollment; repeats of the same course are allowed
    pub fn enroll(&mut self, student_id: StudentId, enrollment: Enrollment, catalog: &Catalog) -> Result<()> {
        validate_enrollment(&enrollment, catalog)?;
        let student = self.get_mut(student_id)?;
        student.enrollments.push(enrollment);
        Ok(())
    }

    pub fn get(&self, id: StudentId) -> Option<&Student> {
        self.index.get(&id).map(|&i| &self.students[i])
    }

    fn get_mut(&mut self, id: StudentId) -> Result<&mut Student> {
        let pos = *self
            .index
            .get(&id)
            .ok_or_else(|| FeeError::not_found("student", id))?;
        Ok(&mut self.students[pos])
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.student_code == code)
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    /// case-insensitive match on name or code, substring match on phone
    pub fn search(&self, term: &str) -> Vec<&Student> {
        let term = term.trim();
        if term.is_empty() {
            return self.students.iter().collect();
        }
        let needle = term.to_lowercase();
        self.students
            .iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.student_code.to_lowercase().contains(&needle)
                    || s.phone.as_deref().map_or(false, |p| p.contains(term))
            })
            .collect()
    }

    pub fn in_batch(&self, batch_id: BatchId) -> impl Iterator<Item = &Student> {
        self.students.iter().filter(move |s| s.batch_id == Some(batch_id))
    }
}
