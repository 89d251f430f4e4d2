use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::discount::{allocate_discount, DiscountRequest, FeeLine};
use crate::errors::{FeeError, Result};
use crate::types::{DiscountType, MonthId, StudentId};

use super::MonthPayment;

/// payment creation request
///
/// Mirrors the `POST payments` body. A client-computed `monthPayments`
/// breakdown, if sent, is ignored: the ledger recomputes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub student_id: StudentId,
    pub selected_months: Vec<MonthId>,
    #[serde(default)]
    pub discount_type: DiscountType,
    /// fixed amount or percent, depending on `discount_type`
    #[serde(default, rename = "discountAmount")]
    pub discount_value: Decimal,
    #[serde(default, rename = "discountApplicableMonths")]
    pub discount_months: Vec<MonthId>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub received_by: String,
    /// caller-chosen invoice number; normally left to the ledger
    #[serde(default)]
    pub invoice_number: Option<String>,
}

impl PaymentRequest {
    pub fn new(student_id: StudentId, selected_months: Vec<MonthId>, received_by: impl Into<String>) -> Self {
        Self {
            student_id,
            selected_months,
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::ZERO,
            discount_months: Vec::new(),
            reference: None,
            received_by: received_by.into(),
            invoice_number: None,
        }
    }

    pub fn with_discount(mut self, discount: DiscountRequest) -> Self {
        self.discount_type = discount.discount_type;
        self.discount_value = discount.value;
        self.discount_months = discount.target_months;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn discount(&self) -> DiscountRequest {
        DiscountRequest {
            discount_type: self.discount_type,
            value: self.discount_value,
            target_months: self.discount_months.clone(),
        }
    }

    /// selected ids with repeats removed, first occurrence wins
    pub fn unique_selection(&self) -> Vec<MonthId> {
        let mut seen = std::collections::HashSet::new();
        self.selected_months
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// administrative override of a stored payment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    pub reference: Option<String>,
    pub received_by: Option<String>,
    pub discount_type: Option<DiscountType>,
    /// replacement breakdown; totals are recomputed from it
    pub month_payments: Option<Vec<MonthPayment>>,
}

impl PaymentUpdate {
    pub fn is_empty(&self) -> bool {
        self.reference.is_none()
            && self.received_by.is_none()
            && self.discount_type.is_none()
            && self.month_payments.is_none()
    }
}

/// per-month and aggregate figures of a payment about to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentBreakdown {
    pub month_payments: Vec<MonthPayment>,
    pub paid_amount: Money,
    pub discount_amount: Money,
    pub discount_type: DiscountType,
    pub discount_months: Vec<MonthId>,
}

impl PaymentBreakdown {
    pub fn gross_amount(&self) -> Money {
        self.month_payments.iter().map(|mp| mp.month_fee).sum()
    }
}

/// combine the selected unpaid months and the discount into one breakdown
pub fn aggregate(selected: &[FeeLine], discount: &DiscountRequest) -> Result<PaymentBreakdown> {
    if selected.is_empty() {
        return Err(FeeError::EmptySelection);
    }

    let allocation = allocate_discount(selected, discount);
    let month_payments: Vec<MonthPayment> = allocation
        .lines
        .iter()
        .map(|line| MonthPayment {
            month_id: line.month_id,
            month_fee: line.fee,
            discount_amount: line.discount,
            paid_amount: line.net(),
        })
        .collect();

    Ok(PaymentBreakdown {
        paid_amount: month_payments.iter().map(|mp| mp.paid_amount).sum(),
        discount_amount: month_payments.iter().map(|mp| mp.discount_amount).sum(),
        discount_type: discount.discount_type,
        discount_months: allocation.targeted_months(),
        month_payments,
    })
}
