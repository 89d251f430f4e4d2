use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::types::{BatchId, CourseId, MonthId};

/// a cohort grouping of courses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub name: String,
    pub active: bool,
}

impl Batch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            active: true,
        }
    }
}

/// a subject taught under one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub fee: Money,
    pub batch_id: BatchId,
}

impl Course {
    pub fn new(name: impl Into<String>, fee: Money, batch_id: BatchId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            fee,
            batch_id,
        }
    }
}

/// one billing period of a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Month {
    pub id: MonthId,
    pub name: String,
    /// ordering key, unique within the course
    pub month_number: u32,
    pub fee: Money,
    pub course_id: CourseId,
}

impl Month {
    pub fn new(name: impl Into<String>, month_number: u32, fee: Money, course_id: CourseId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            month_number,
            fee,
            course_id,
        }
    }
}

/// batch, course and month catalog
///
/// Entries keep insertion order so every listing (and therefore every
/// resolver result) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    batches: Vec<Batch>,
    courses: Vec<Course>,
    months: Vec<Month>,
    batch_index: HashMap<BatchId, usize>,
    course_index: HashMap<CourseId, usize>,
    month_index: HashMap<MonthId, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_batch(&mut self, batch: Batch) -> Result<BatchId> {
        if self.batch_index.contains_key(&batch.id) {
            return Err(FeeError::CatalogIntegrity {
                message: format!("batch {} already exists", batch.id),
            });
        }
        let id = batch.id;
        self.batch_index.insert(id, self.batches.len());
        self.batches.push(batch);
        Ok(id)
    }

    pub fn add_course(&mut self, course: Course) -> Result<CourseId> {
        if self.course_index.contains_key(&course.id) {
            return Err(FeeError::CatalogIntegrity {
                message: format!("course {} already exists", course.id),
            });
        }
        if !self.batch_index.contains_key(&course.batch_id) {
            return Err(FeeError::CatalogIntegrity {
                message: format!("course '{}' references unknown batch {}", course.name, course.batch_id),
            });
        }
        let id = course.id;
        self.course_index.insert(id, self.courses.len());
        self.courses.push(course);
        Ok(id)
    }

    pub fn add_month(&mut self, month: Month) -> Result<MonthId> {
        if self.month_index.contains_key(&month.id) {
            return Err(FeeError::CatalogIntegrity {
                message: format!("month {} already exists", month.id),
            });
        }
        if !self.course_index.contains_key(&month.course_id) {
            return Err(FeeError::CatalogIntegrity {
                message: format!("month '{}' references unknown course {}", month.name, month.course_id),
            });
        }
        if month.fee.is_negative() {
            return Err(FeeError::validation(format!(
                "month '{}' has negative fee {}",
                month.name, month.fee
            )));
        }
        let clash = self
            .months
            .iter()
            .any(|m| m.course_id == month.course_id && m.month_number == month.month_number);
        if clash {
            return Err(FeeError::CatalogIntegrity {
                message: format!(
                    "month number {} already used in course {}",
                    month.month_number, month.course_id
                ),
            });
        }
        let id = month.id;
        self.month_index.insert(id, self.months.len());
        self.months.push(month);
        Ok(id)
    }

    /// remove a batch that no course references
    pub fn remove_batch(&mut self, id: BatchId) -> Result<Batch> {
        if self.courses.iter().any(|c| c.batch_id == id) {
            return Err(FeeError::CatalogIntegrity {
                message: format!("batch {} still has courses", id),
            });
        }
        let pos = self
            .batch_index
            .get(&id)
            .copied()
            .ok_or_else(|| FeeError::not_found("batch", id))?;
        let removed = self.batches.remove(pos);
        self.batch_index = index_by(&self.batches, |b| b.id);
        Ok(removed)
    }

    /// remove a course that no month references
    pub fn remove_course(&mut self, id: CourseId) -> Result<Course> {
        if self.months.iter().any(|m| m.course_id == id) {
            return Err(FeeError::CatalogIntegrity {
                message: format!("course {} still has months", id),
            });
        }
        let pos = self
            .course_index
            .get(&id)
            .copied()
            .ok_or_else(|| FeeError::not_found("course", id))?;
        let removed = self.courses.remove(pos);
        self.course_index = index_by(&self.courses, |c| c.id);
        Ok(removed)
    }

    pub fn batch(&self, id: BatchId) -> Option<&Batch> {
        self.batch_index.get(&id).map(|&i| &self.batches[i])
    }

    pub fn course(&self, id: CourseId) -> Option<&Course> {
        self.course_index.get(&id).map(|&i| &self.courses[i])
    }

    pub fn month(&self, id: MonthId) -> Option<&Month> {
        self.month_index.get(&id).map(|&i| &self.months[i])
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    /// all months in catalog order
    pub fn months(&self) -> &[Month] {
        &self.months
    }

    /// months of one course, catalog order
    pub fn months_for_course(&self, course_id: CourseId) -> impl Iterator<Item = &Month> {
        self.months.iter().filter(move |m| m.course_id == course_id)
    }

    pub fn courses_for_batch(&self, batch_id: BatchId) -> impl Iterator<Item = &Course> {
        self.courses.iter().filter(move |c| c.batch_id == batch_id)
    }

    /// course owning a month
    pub fn course_of(&self, month: &Month) -> Option<&Course> {
        self.course(month.course_id)
    }

    /// batch owning a course
    pub fn batch_of(&self, course: &Course) -> Option<&Batch> {
        self.batch(course.batch_id)
    }

    /// batch a month ultimately belongs to
    pub fn batch_of_month(&self, month_id: MonthId) -> Option<&Batch> {
        let month = self.month(month_id)?;
        let course = self.course_of(month)?;
        self.batch_of(course)
    }
}

fn index_by<T, F: Fn(&T) -> Uuid>(items: &[T], key: F) -> HashMap<Uuid, usize> {
    items.iter().enumerate().map(|(i, item)| (key(item), i)).collect()
}
