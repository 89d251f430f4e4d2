//! Enrollment resolution: which catalog months a student can be billed for.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::{Catalog, Month};
use crate::decimal::Money;
use crate::roster::{Enrollment, Student};
use crate::types::{CourseId, MonthId};

pub const UNKNOWN_COURSE: &str = "Unknown Course";
pub const UNKNOWN_BATCH: &str = "Unknown Batch";

/// a catalog month tagged with display names of its course and batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillableMonth {
    pub month: Month,
    pub course_name: String,
    pub batch_name: String,
}

impl BillableMonth {
    pub fn id(&self) -> MonthId {
        self.month.id
    }

    pub fn fee(&self) -> Money {
        self.month.fee
    }
}

/// an enrolled course with its batch name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolledCourse {
    pub course_id: CourseId,
    pub name: String,
    pub batch_name: String,
}

/// months billable under a single enrollment, catalog order
///
/// An enrollment whose course is gone from the catalog yields nothing. An
/// unresolvable starting month behaves as month number 0 and an unresolvable
/// ending month as no upper bound.
pub fn months_for_enrollment<'a>(enrollment: &Enrollment, catalog: &'a Catalog) -> Vec<&'a Month> {
    if catalog.course(enrollment.course_id).is_none() {
        tracing::debug!(course_id = %enrollment.course_id, "skipping enrollment with orphaned course");
        return Vec::new();
    }

    let start = enrollment
        .starting_month_id
        .and_then(|id| catalog.month(id))
        .map(|m| m.month_number)
        .unwrap_or(0);
    let end = enrollment
        .ending_month_id
        .and_then(|id| catalog.month(id))
        .map(|m| m.month_number);

    catalog
        .months_for_course(enrollment.course_id)
        .filter(|m| m.month_number >= start && end.map_or(true, |end| m.month_number <= end))
        .collect()
}

/// union of all enrollments' billable months, de-duplicated, catalog order
pub fn resolve_billable_months(student: &Student, catalog: &Catalog) -> Vec<BillableMonth> {
    resolve_filtered(student, catalog, |_| true)
}

/// resolver restricted to one course
pub fn resolve_billable_months_for_course(
    student: &Student,
    catalog: &Catalog,
    course_id: CourseId,
) -> Vec<BillableMonth> {
    resolve_filtered(student, catalog, |e| e.course_id == course_id)
}

fn resolve_filtered<F>(student: &Student, catalog: &Catalog, keep: F) -> Vec<BillableMonth>
where
    F: Fn(&Enrollment) -> bool,
{
    let mut reachable: HashSet<MonthId> = HashSet::new();
    for enrollment in student.enrollments.iter().filter(|e| keep(e)) {
        reachable.extend(months_for_enrollment(enrollment, catalog).iter().map(|m| m.id));
    }

    // walking the catalog once gives de-duplication and catalog order together
    let resolved: Vec<BillableMonth> = catalog
        .months()
        .iter()
        .filter(|m| reachable.contains(&m.id))
        .map(|m| tag_month(m, catalog))
        .collect();

    tracing::debug!(
        student_id = %student.id,
        enrollments = student.enrollments.len(),
        months = resolved.len(),
        "resolved billable months"
    );
    resolved
}

fn tag_month(month: &Month, catalog: &Catalog) -> BillableMonth {
    let course = catalog.course_of(month);
    BillableMonth {
        month: month.clone(),
        course_name: course.map_or_else(|| UNKNOWN_COURSE.to_string(), |c| c.name.clone()),
        batch_name: course
            .and_then(|c| catalog.batch_of(c))
            .map_or_else(|| UNKNOWN_BATCH.to_string(), |b| b.name.clone()),
    }
}

/// distinct enrolled courses that still exist in the catalog
pub fn student_courses(student: &Student, catalog: &Catalog) -> Vec<EnrolledCourse> {
    let mut seen = HashSet::new();
    student
        .enrollments
        .iter()
        .filter_map(|e| catalog.course(e.course_id))
        .filter(|c| seen.insert(c.id))
        .map(|c| EnrolledCourse {
            course_id: c.id,
            name: c.name.clone(),
            batch_name: catalog
                .batch_of(c)
                .map_or_else(|| UNKNOWN_BATCH.to_string(), |b| b.name.clone()),
        })
        .collect()
}
