pub mod memory;
pub mod sqlite;

use crate::errors::Result;
use crate::payments::Payment;
use crate::types::{PaymentId, StudentId};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// persistence for payment records
///
/// Implementations must make `next_invoice_sequence` atomic and must reject
/// an insert or replace that would give a (student, month) pair to two
/// payments (`FeeError::AlreadyPaid`) or reuse an invoice number
/// (`FeeError::DuplicateInvoice`). A write is all or nothing.
pub trait PaymentStore {
    /// consume and return the next invoice sequence value
    fn next_invoice_sequence(&self) -> Result<u64>;

    /// the value `next_invoice_sequence` would return, without consuming it
    fn peek_invoice_sequence(&self) -> Result<u64>;

    fn insert(&self, payment: &Payment) -> Result<()>;

    /// overwrite an existing payment, keeping its id
    fn replace(&self, payment: &Payment) -> Result<()>;

    fn delete(&self, id: PaymentId) -> Result<Option<Payment>>;

    fn get(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// all payments in insertion order
    fn list(&self) -> Result<Vec<Payment>>;

    fn list_for_student(&self, student_id: StudentId) -> Result<Vec<Payment>>;

    fn count(&self) -> Result<u64>;
}
