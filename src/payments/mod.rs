pub mod aggregate;
pub mod document;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::types::{DiscountType, MonthId, PaymentId, StudentId};

pub use aggregate::{aggregate, PaymentBreakdown, PaymentRequest, PaymentUpdate};
pub use document::PaymentDocument;

/// per-month line of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPayment {
    pub month_id: MonthId,
    #[serde(default)]
    pub month_fee: Money,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub paid_amount: Money,
}

impl MonthPayment {
    /// `fee = paid + discount` with nothing negative
    pub fn is_balanced(&self) -> bool {
        !self.month_fee.is_negative()
            && !self.discount_amount.is_negative()
            && !self.paid_amount.is_negative()
            && self.paid_amount + self.discount_amount == self.month_fee
    }
}

/// check every breakdown line and reject a month listed twice
pub fn validate_breakdown(lines: &[MonthPayment]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for line in lines {
        if !seen.insert(line.month_id) {
            return Err(FeeError::validation(format!(
                "month {} appears twice in the breakdown",
                line.month_id
            )));
        }
        if !line.is_balanced() {
            return Err(FeeError::validation(format!(
                "month {}: fee {} does not equal paid {} plus discount {}",
                line.month_id, line.month_fee, line.paid_amount, line.discount_amount
            )));
        }
    }
    Ok(())
}

/// one payment transaction
///
/// The breakdown is canonical. `legacy_months` only holds ids persisted by
/// older writers without a breakdown entry; the flat `months` list of the
/// stored document is derived from both at serialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PaymentDocument", into = "PaymentDocument")]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_number: String,
    pub student_id: StudentId,
    pub paid_amount: Money,
    pub discount_amount: Money,
    pub discount_type: DiscountType,
    pub discount_months: Vec<MonthId>,
    pub month_payments: Vec<MonthPayment>,
    pub legacy_months: Vec<MonthId>,
    pub reference: Option<String>,
    pub received_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// every month this payment settles: breakdown first, then legacy ids
    pub fn month_ids(&self) -> impl Iterator<Item = MonthId> + '_ {
        self.month_payments
            .iter()
            .map(|mp| mp.month_id)
            .chain(self.legacy_months.iter().copied())
    }

    pub fn month_count(&self) -> usize {
        self.month_payments.len() + self.legacy_months.len()
    }

    pub fn covers(&self, month_id: MonthId) -> bool {
        self.month_ids().any(|id| id == month_id)
    }

    pub fn breakdown_for(&self, month_id: MonthId) -> Option<&MonthPayment> {
        self.month_payments.iter().find(|mp| mp.month_id == month_id)
    }

    pub fn has_discount(&self) -> bool {
        self.discount_amount.is_positive()
    }

    /// amount before discount
    pub fn gross_amount(&self) -> Money {
        self.paid_amount + self.discount_amount
    }

    /// (paid, discount) attributable to one month
    ///
    /// Breakdown entries are exact. Legacy months split whatever the breakdown
    /// does not account for evenly.
    pub fn month_share(&self, month_id: MonthId) -> Option<(Money, Money)> {
        if let Some(mp) = self.breakdown_for(month_id) {
            return Some((mp.paid_amount, mp.discount_amount));
        }
        if !self.legacy_months.contains(&month_id) {
            return None;
        }
        let legacy_count = Decimal::from(self.legacy_months.len() as u64);
        let paid_rest = self
            .paid_amount
            .saturating_sub(self.month_payments.iter().map(|mp| mp.paid_amount).sum());
        let discount_rest = self
            .discount_amount
            .saturating_sub(self.month_payments.iter().map(|mp| mp.discount_amount).sum());
        Some((paid_rest / legacy_count, discount_rest / legacy_count))
    }

    /// totals from the breakdown; legacy-only payments keep their stored totals
    pub fn recompute_totals(&mut self) {
        if self.month_payments.is_empty() {
            return;
        }
        self.paid_amount = self.month_payments.iter().map(|mp| mp.paid_amount).sum();
        self.discount_amount = self.month_payments.iter().map(|mp| mp.discount_amount).sum();
    }
}
