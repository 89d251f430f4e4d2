use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{MonthId, PaymentId, StudentId};

/// all events that can be emitted by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // invoice events
    InvoiceNumberIssued {
        invoice_number: String,
        sequence: u64,
    },
    InvoiceCollision {
        invoice_number: String,
        attempt: u32,
    },

    // payment events
    PaymentRecorded {
        payment_id: PaymentId,
        student_id: StudentId,
        invoice_number: String,
        paid_amount: Money,
        discount_amount: Money,
        month_count: usize,
        timestamp: DateTime<Utc>,
    },
    PaidMonthsSkipped {
        student_id: StudentId,
        month_ids: Vec<MonthId>,
        timestamp: DateTime<Utc>,
    },
    PaymentConflict {
        student_id: StudentId,
        month_ids: Vec<MonthId>,
        timestamp: DateTime<Utc>,
    },

    // administrative overrides
    PaymentAdjusted {
        payment_id: PaymentId,
        old_paid_amount: Money,
        new_paid_amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentVoided {
        payment_id: PaymentId,
        invoice_number: String,
        released_months: Vec<MonthId>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}
