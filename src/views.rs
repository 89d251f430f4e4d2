//! Read-side projections of stored payments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::config::CurrencyConfig;
use crate::decimal::Money;
use crate::enrollment::{UNKNOWN_BATCH, UNKNOWN_COURSE};
use crate::payments::Payment;
use crate::roster::Roster;
use crate::types::{MonthId, StudentId};

const UNKNOWN_MONTH: &str = "Unknown Month";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: StudentId,
    pub student_code: String,
    pub name: String,
}

/// one month covered by a payment, with catalog names resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthLine {
    pub month_id: MonthId,
    pub name: String,
    pub month_number: Option<u32>,
    pub course_name: String,
    pub batch_name: String,
    /// breakdown fee, or the current catalog fee for legacy months
    pub fee: Option<Money>,
    /// None when the payment carries no split for this month
    pub discount: Option<Money>,
    pub paid: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment: Payment,
    pub student: Option<StudentRef>,
    pub months: Vec<MonthLine>,
}

fn month_line(payment: &Payment, month_id: MonthId, catalog: &Catalog) -> MonthLine {
    let month = catalog.month(month_id);
    let course = month.and_then(|m| catalog.course_of(m));
    let batch = course.and_then(|c| catalog.batch_of(c));
    let split = payment.breakdown_for(month_id);

    MonthLine {
        month_id,
        name: month.map_or_else(|| UNKNOWN_MONTH.to_string(), |m| m.name.clone()),
        month_number: month.map(|m| m.month_number),
        course_name: course.map_or_else(|| UNKNOWN_COURSE.to_string(), |c| c.name.clone()),
        batch_name: batch.map_or_else(|| UNKNOWN_BATCH.to_string(), |b| b.name.clone()),
        fee: split.map(|mp| mp.month_fee).or_else(|| month.map(|m| m.fee)),
        discount: split.map(|mp| mp.discount_amount),
        paid: split.map(|mp| mp.paid_amount),
    }
}

/// resolve a payment's student and months against the current catalog
pub fn project_payment(payment: &Payment, catalog: &Catalog, roster: &Roster) -> PaymentView {
    let student = roster.get(payment.student_id).map(|s| StudentRef {
        id: s.id,
        student_code: s.student_code.clone(),
        name: s.name.clone(),
    });
    let months = payment
        .month_ids()
        .map(|id| month_line(payment, id, catalog))
        .collect();

    PaymentView {
        payment: payment.clone(),
        student,
        months,
    }
}

/// printable invoice for a single payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    pub invoice_number: String,
    pub created_at: DateTime<Utc>,
    pub student: Option<StudentRef>,
    pub lines: Vec<MonthLine>,
    pub total_amount: Money,
    pub discount_amount: Money,
    pub paid_amount: Money,
    pub reference: Option<String>,
    pub received_by: String,
    pub currency: CurrencyConfig,
}

impl InvoiceView {
    pub fn from_view(view: PaymentView, currency: &CurrencyConfig) -> Self {
        let payment = view.payment;
        InvoiceView {
            invoice_number: payment.invoice_number.clone(),
            created_at: payment.created_at,
            student: view.student,
            lines: view.months,
            total_amount: payment.gross_amount(),
            discount_amount: payment.discount_amount,
            paid_amount: payment.paid_amount,
            reference: payment.reference,
            received_by: payment.received_by,
            currency: currency.clone(),
        }
    }

    /// amount with the configured currency symbol, e.g. `৳2880.00`
    pub fn display_amount(&self, amount: Money) -> String {
        format!("{}{}", self.currency.symbol, amount.to_fixed())
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
