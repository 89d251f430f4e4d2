//! Discount allocation over a selection of months.
//!
//! Percentage discounts apply to each targeted month's own fee. Fixed
//! discounts are spread by fee share over the targeted months and clamped to
//! their total fee. Either way `0 <= discount <= fee` holds per month.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::Month;
use crate::decimal::{Money, Rate};
use crate::enrollment::BillableMonth;
use crate::types::{DiscountType, MonthId};

/// a month and its gross fee, as presented to the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLine {
    pub month_id: MonthId,
    pub fee: Money,
}

impl From<&BillableMonth> for FeeLine {
    fn from(m: &BillableMonth) -> Self {
        FeeLine {
            month_id: m.month.id,
            fee: m.month.fee,
        }
    }
}

impl From<&Month> for FeeLine {
    fn from(m: &Month) -> Self {
        FeeLine {
            month_id: m.id,
            fee: m.fee,
        }
    }
}

/// requested discount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiscountRequest {
    pub discount_type: DiscountType,
    /// amount for `Fixed`, percent for `Percentage`
    pub value: Decimal,
    /// months the discount applies to; empty means every selected month
    pub target_months: Vec<MonthId>,
}

impl DiscountRequest {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fixed(amount: Money, target_months: Vec<MonthId>) -> Self {
        Self {
            discount_type: DiscountType::Fixed,
            value: amount.as_decimal(),
            target_months,
        }
    }

    pub fn percentage(percent: Decimal, target_months: Vec<MonthId>) -> Self {
        Self {
            discount_type: DiscountType::Percentage,
            value: percent,
            target_months,
        }
    }

    pub fn is_active(&self) -> bool {
        self.value > Decimal::ZERO
    }
}

/// per-month discount decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDiscount {
    pub month_id: MonthId,
    pub fee: Money,
    pub discount: Money,
    /// whether the month was in the effective target set
    pub targeted: bool,
}

impl MonthDiscount {
    pub fn net(&self) -> Money {
        self.fee.saturating_sub(self.discount)
    }
}

/// allocation result, one line per selected month in selection order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiscountAllocation {
    pub lines: Vec<MonthDiscount>,
}

impl DiscountAllocation {
    pub fn discount_for(&self, month_id: MonthId) -> Money {
        self.lines
            .iter()
            .find(|l| l.month_id == month_id)
            .map_or(Money::ZERO, |l| l.discount)
    }

    pub fn total_fee(&self) -> Money {
        self.lines.iter().map(|l| l.fee).sum()
    }

    pub fn total_discount(&self) -> Money {
        self.lines.iter().map(|l| l.discount).sum()
    }

    pub fn total_net(&self) -> Money {
        self.lines.iter().map(|l| l.net()).sum()
    }

    /// months that were eligible for the discount
    pub fn targeted_months(&self) -> Vec<MonthId> {
        self.lines.iter().filter(|l| l.targeted).map(|l| l.month_id).collect()
    }
}

/// distribute a discount over the selected months
pub fn allocate_discount(selected: &[FeeLine], request: &DiscountRequest) -> DiscountAllocation {
    let targets: HashSet<MonthId> = if request.target_months.is_empty() {
        selected.iter().map(|l| l.month_id).collect()
    } else {
        request.target_months.iter().copied().collect()
    };

    let mut lines: Vec<MonthDiscount> = selected
        .iter()
        .map(|l| MonthDiscount {
            month_id: l.month_id,
            fee: l.fee,
            discount: Money::ZERO,
            targeted: targets.contains(&l.month_id),
        })
        .collect();

    if !request.is_active() {
        return DiscountAllocation { lines };
    }

    match request.discount_type {
        DiscountType::Percentage => {
            let rate = Rate::from_percentage(request.value);
            for line in lines.iter_mut().filter(|l| l.targeted) {
                line.discount = line.fee.percentage(rate).min(line.fee);
            }
        }
        DiscountType::Fixed => allocate_fixed(&mut lines, Money::from_decimal(request.value)),
    }

    tracing::debug!(
        discount_type = %request.discount_type,
        value = %request.value,
        months = lines.len(),
        "allocated discount"
    );
    DiscountAllocation { lines }
}

fn allocate_fixed(lines: &mut [MonthDiscount], amount: Money) {
    let targeted_total: Money = lines.iter().filter(|l| l.targeted).map(|l| l.fee).sum();
    if targeted_total.is_zero() {
        return;
    }
    let effective = amount.min(targeted_total);

    let targeted: Vec<usize> = (0..lines.len()).filter(|&i| lines[i].targeted).collect();
    let Some((&last, rest)) = targeted.split_last() else {
        return;
    };

    let mut allocated = Money::ZERO;
    for &i in rest {
        let share = effective.share_of(lines[i].fee, targeted_total).min(lines[i].fee);
        lines[i].discount = share;
        allocated += share;
    }
    // shares are truncated, so the remainder left for the last month is never negative
    lines[last].discount = effective.saturating_sub(allocated).min(lines[last].fee);
}

/// totals shown before a payment is submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePreview {
    pub lines: Vec<MonthDiscount>,
    pub total_amount: Money,
    pub discount_amount: Money,
    pub due_amount: Money,
}

/// preview totals, computed by the same allocator that produces payment breakdowns
pub fn preview(selected: &[FeeLine], request: &DiscountRequest) -> FeePreview {
    let allocation = allocate_discount(selected, request);
    FeePreview {
        total_amount: allocation.total_fee(),
        discount_amount: allocation.total_discount(),
        due_amount: allocation.total_net(),
        lines: allocation.lines,
    }
}
