//! stored/wire shape of a payment record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::decimal::Money;
use crate::types::{DiscountType, MonthId, PaymentId, StudentId};

use super::{MonthPayment, Payment};

/// persisted payment document
///
/// Writers always populate both `months` and `monthPayments`; readers accept
/// documents carrying either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDocument {
    pub id: PaymentId,
    pub invoice_number: String,
    pub student_id: StudentId,
    #[serde(default)]
    pub paid_amount: Money,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub discount_applicable_months: Vec<MonthId>,
    #[serde(default)]
    pub months: Vec<MonthId>,
    #[serde(default)]
    pub month_payments: Vec<MonthPayment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub received_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Payment> for PaymentDocument {
    fn from(p: Payment) -> Self {
        let months = p.month_ids().collect();
        PaymentDocument {
            id: p.id,
            invoice_number: p.invoice_number,
            student_id: p.student_id,
            paid_amount: p.paid_amount,
            discount_amount: p.discount_amount,
            discount_type: p.discount_type,
            discount_applicable_months: p.discount_months,
            months,
            month_payments: p.month_payments,
            reference: p.reference,
            received_by: p.received_by,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl From<PaymentDocument> for Payment {
    fn from(doc: PaymentDocument) -> Self {
        let mut in_breakdown: HashSet<MonthId> = doc.month_payments.iter().map(|mp| mp.month_id).collect();
        // ids listed only in `months` survive as legacy entries, once each
        let legacy_months = doc
            .months
            .into_iter()
            .filter(|id| in_breakdown.insert(*id))
            .collect();

        Payment {
            id: doc.id,
            invoice_number: doc.invoice_number,
            student_id: doc.student_id,
            paid_amount: doc.paid_amount,
            discount_amount: doc.discount_amount,
            discount_type: doc.discount_type,
            discount_months: doc.discount_applicable_months,
            month_payments: doc.month_payments,
            legacy_months,
            reference: doc.reference,
            received_by: doc.received_by,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

impl PaymentDocument {
    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn gross_amount(&self) -> Money {
        self.paid_amount + self.discount_amount
    }
}
