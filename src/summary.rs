use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::decimal::Money;
use crate::enrollment::resolve_billable_months;
use crate::paid::{paid_month_ids, partition_billable};
use crate::payments::Payment;
use crate::roster::Student;
use crate::types::{MonthId, PaymentStatus, StudentId};

/// fee standing of one student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFeeSummary {
    pub student_id: StudentId,
    pub billable_months: usize,
    pub paid_months: usize,
    pub unpaid_months: Vec<MonthId>,
    /// fees of every billable month at catalog price
    pub total_billed: Money,
    pub total_collected: Money,
    pub total_discount: Money,
    /// fees of billable months not yet paid
    pub outstanding: Money,
    pub status: PaymentStatus,
}

pub fn summarize(student: &Student, catalog: &Catalog, history: &[Payment]) -> StudentFeeSummary {
    let billable = resolve_billable_months(student, catalog);
    let total_billed: Money = billable.iter().map(|m| m.fee()).sum();
    let (paid, unpaid) = partition_billable(billable, &paid_month_ids(history));

    let status = if unpaid.is_empty() {
        PaymentStatus::Paid
    } else if paid.is_empty() {
        PaymentStatus::Unpaid
    } else {
        PaymentStatus::Partial
    };

    StudentFeeSummary {
        student_id: student.id,
        billable_months: paid.len() + unpaid.len(),
        paid_months: paid.len(),
        outstanding: unpaid.iter().map(|m| m.fee()).sum(),
        unpaid_months: unpaid.iter().map(|m| m.id()).collect(),
        total_billed,
        total_collected: history.iter().map(|p| p.paid_amount).sum(),
        total_discount: history.iter().map(|p| p.discount_amount).sum(),
        status,
    }
}
