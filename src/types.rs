use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a batch (cohort)
pub type BatchId = Uuid;

/// unique identifier for a course
pub type CourseId = Uuid;

/// unique identifier for a billing month
pub type MonthId = Uuid;

/// unique identifier for a student record
pub type StudentId = Uuid;

/// unique identifier for a payment record
pub type PaymentId = Uuid;

/// how a discount value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// absolute amount, spread over the targeted months by fee share
    #[default]
    Fixed,
    /// percent of each targeted month's fee
    Percentage,
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountType::Fixed => write!(f, "fixed"),
            DiscountType::Percentage => write!(f, "percentage"),
        }
    }
}

/// payment standing of a student across all billable months
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// nothing billable is left unpaid
    Paid,
    /// some billable months are paid, some are not
    Partial,
    /// no billable month has been paid
    Unpaid,
}
