//! Paid-month index over a student's payment history.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::enrollment::BillableMonth;
use crate::payments::Payment;
use crate::types::MonthId;

/// months already settled, as returned by `GET payments/student/{id}/paid-months`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidMonths {
    /// first-seen order across the history
    pub paid_month_ids: Vec<MonthId>,
    pub total_payments: usize,
}

impl PaidMonths {
    pub fn contains(&self, month_id: MonthId) -> bool {
        self.paid_month_ids.contains(&month_id)
    }

    pub fn to_set(&self) -> HashSet<MonthId> {
        self.paid_month_ids.iter().copied().collect()
    }
}

/// union of legacy ids and breakdown ids across every payment
pub fn paid_month_ids<'a, I>(history: I) -> PaidMonths
where
    I: IntoIterator<Item = &'a Payment>,
{
    let mut seen = HashSet::new();
    let mut paid_month_ids = Vec::new();
    let mut total_payments = 0;

    for payment in history {
        total_payments += 1;
        for id in payment.month_ids() {
            if seen.insert(id) {
                paid_month_ids.push(id);
            }
        }
    }

    PaidMonths {
        paid_month_ids,
        total_payments,
    }
}

/// split billable months into (paid, unpaid), preserving order
pub fn partition_billable(
    billable: Vec<BillableMonth>,
    paid: &PaidMonths,
) -> (Vec<BillableMonth>, Vec<BillableMonth>) {
    let paid_set = paid.to_set();
    billable.into_iter().partition(|m| paid_set.contains(&m.id()))
}
