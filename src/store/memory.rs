use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use crate::errors::{FeeError, Result};
use crate::payments::Payment;
use crate::types::{MonthId, PaymentId, StudentId};

use super::PaymentStore;

/// in-process payment store
///
/// A single lock guards the records, the (student, month) index and the
/// invoice sequence, so check-and-insert is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    payments: Vec<Payment>,
    paid: HashMap<(StudentId, MonthId), PaymentId>,
    invoice_numbers: HashSet<String>,
    sequence: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn position(&self, id: PaymentId) -> Option<usize> {
        self.payments.iter().position(|p| p.id == id)
    }

    /// months of `payment` already held by some other payment
    fn conflicts(&self, payment: &Payment) -> Vec<MonthId> {
        payment
            .month_ids()
            .filter(|m| {
                self.paid
                    .get(&(payment.student_id, *m))
                    .map_or(false, |holder| *holder != payment.id)
            })
            .collect()
    }

    fn check(&self, payment: &Payment, previous_invoice: Option<&str>) -> Result<()> {
        let conflicts = self.conflicts(payment);
        if !conflicts.is_empty() {
            return Err(FeeError::AlreadyPaid {
                student_id: payment.student_id,
                month_ids: conflicts,
            });
        }
        let renumbered = previous_invoice != Some(payment.invoice_number.as_str());
        if renumbered && self.invoice_numbers.contains(&payment.invoice_number) {
            return Err(FeeError::DuplicateInvoice {
                invoice_number: payment.invoice_number.clone(),
            });
        }
        Ok(())
    }

    fn index(&mut self, payment: &Payment) {
        for m in payment.month_ids() {
            self.paid.insert((payment.student_id, m), payment.id);
        }
        self.invoice_numbers.insert(payment.invoice_number.clone());
    }

    fn unindex(&mut self, payment: &Payment) {
        for m in payment.month_ids() {
            self.paid.remove(&(payment.student_id, m));
        }
        self.invoice_numbers.remove(&payment.invoice_number);
    }
}

impl PaymentStore for MemoryStore {
    fn next_invoice_sequence(&self) -> Result<u64> {
        let mut inner = self.inner.write();
        inner.sequence += 1;
        Ok(inner.sequence)
    }

    fn peek_invoice_sequence(&self) -> Result<u64> {
        Ok(self.inner.read().sequence + 1)
    }

    fn insert(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.position(payment.id).is_some() {
            return Err(FeeError::validation(format!("payment {} already exists", payment.id)));
        }
        inner.check(payment, None)?;
        inner.index(payment);
        inner.payments.push(payment.clone());
        tracing::debug!(payment_id = %payment.id, invoice = %payment.invoice_number, "payment stored");
        Ok(())
    }

    fn replace(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.write();
        let pos = inner
            .position(payment.id)
            .ok_or_else(|| FeeError::not_found("payment", payment.id))?;
        let previous = inner.payments[pos].clone();
        inner.check(payment, Some(previous.invoice_number.as_str()))?;
        inner.unindex(&previous);
        inner.index(payment);
        inner.payments[pos] = payment.clone();
        Ok(())
    }

    fn delete(&self, id: PaymentId) -> Result<Option<Payment>> {
        let mut inner = self.inner.write();
        let Some(pos) = inner.position(id) else {
            return Ok(None);
        };
        let removed = inner.payments.remove(pos);
        inner.unindex(&removed);
        Ok(Some(removed))
    }

    fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.inner.read().payments.iter().find(|p| p.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<Payment>> {
        Ok(self.inner.read().payments.clone())
    }

    fn list_for_student(&self, student_id: StudentId) -> Result<Vec<Payment>> {
        Ok(self
            .inner
            .read()
            .payments
            .iter()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.inner.read().payments.len() as u64)
    }
}
