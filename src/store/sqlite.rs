use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::errors::{FeeError, Result};
use crate::payments::Payment;
use crate::types::{MonthId, PaymentId, StudentId};

use super::PaymentStore;

/// payment store backed by a single sqlite database
///
/// Payments are kept as their json document; `payment_months` carries the
/// (student, month) primary key that makes a month payable once. Writes take
/// the database write lock up front, so handles on the same file serialize.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS payments(
                id TEXT PRIMARY KEY,
                invoice_number TEXT NOT NULL UNIQUE,
                student_id TEXT NOT NULL,
                document TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS payment_months(
                student_id TEXT NOT NULL,
                month_id TEXT NOT NULL,
                payment_id TEXT NOT NULL,
                PRIMARY KEY(student_id, month_id),
                FOREIGN KEY(payment_id) REFERENCES payments(id) ON DELETE CASCADE
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS invoice_sequence(
                id INTEGER PRIMARY KEY CHECK (id = 1),
                value INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO invoice_sequence(id, value) VALUES (1, 0)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn write_tx(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// uniqueness violations from the schema as the conflicts they stand for
fn constraint_conflict(err: rusqlite::Error, payment: &Payment) -> FeeError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            if message.contains("payments.invoice_number") {
                return FeeError::DuplicateInvoice {
                    invoice_number: payment.invoice_number.clone(),
                };
            }
            if message.contains("payment_months.") {
                return FeeError::AlreadyPaid {
                    student_id: payment.student_id,
                    month_ids: payment.month_ids().collect(),
                };
            }
        }
    }
    err.into()
}

fn decode(document: &str) -> Result<Payment> {
    Ok(serde_json::from_str(document)?)
}

fn conflicts(tx: &Transaction<'_>, payment: &Payment) -> Result<Vec<MonthId>> {
    let mut stmt =
        tx.prepare("SELECT payment_id FROM payment_months WHERE student_id = ? AND month_id = ?")?;
    let student = payment.student_id.to_string();
    let own_id = payment.id.to_string();
    let mut taken = Vec::new();
    for month_id in payment.month_ids() {
        let holder: Option<String> = stmt
            .query_row(params![student, month_id.to_string()], |r| r.get(0))
            .optional()?;
        if holder.map_or(false, |h| h != own_id) {
            taken.push(month_id);
        }
    }
    Ok(taken)
}

fn check(tx: &Transaction<'_>, payment: &Payment) -> Result<()> {
    let taken = conflicts(tx, payment)?;
    if !taken.is_empty() {
        return Err(FeeError::AlreadyPaid {
            student_id: payment.student_id,
            month_ids: taken,
        });
    }
    let clash: Option<String> = tx
        .query_row(
            "SELECT id FROM payments WHERE invoice_number = ? AND id <> ?",
            params![payment.invoice_number, payment.id.to_string()],
            |r| r.get(0),
        )
        .optional()?;
    if clash.is_some() {
        return Err(FeeError::DuplicateInvoice {
            invoice_number: payment.invoice_number.clone(),
        });
    }
    Ok(())
}

fn index_months(tx: &Transaction<'_>, payment: &Payment) -> Result<()> {
    let mut stmt =
        tx.prepare("INSERT INTO payment_months(student_id, month_id, payment_id) VALUES (?, ?, ?)")?;
    let student = payment.student_id.to_string();
    let id = payment.id.to_string();
    for month_id in payment.month_ids() {
        stmt.execute(params![student, month_id.to_string(), id])
            .map_err(|e| constraint_conflict(e, payment))?;
    }
    Ok(())
}

impl PaymentStore for SqliteStore {
    fn next_invoice_sequence(&self) -> Result<u64> {
        let mut conn = self.conn.lock();
        let tx = write_tx(&mut conn)?;
        tx.execute("UPDATE invoice_sequence SET value = value + 1 WHERE id = 1", [])?;
        let value: i64 = tx.query_row("SELECT value FROM invoice_sequence WHERE id = 1", [], |r| r.get(0))?;
        tx.commit()?;
        Ok(value as u64)
    }

    fn peek_invoice_sequence(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let value: i64 = conn.query_row("SELECT value FROM invoice_sequence WHERE id = 1", [], |r| r.get(0))?;
        Ok(value as u64 + 1)
    }

    fn insert(&self, payment: &Payment) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = write_tx(&mut conn)?;

        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM payments WHERE id = ?", [payment.id.to_string()], |r| r.get(0))
            .optional()?;
        if exists.is_some() {
            return Err(FeeError::validation(format!("payment {} already exists", payment.id)));
        }
        check(&tx, payment)?;

        tx.execute(
            "INSERT INTO payments(id, invoice_number, student_id, document) VALUES (?, ?, ?, ?)",
            params![
                payment.id.to_string(),
                payment.invoice_number,
                payment.student_id.to_string(),
                serde_json::to_string(payment)?
            ],
        )
        .map_err(|e| constraint_conflict(e, payment))?;
        index_months(&tx, payment)?;
        tx.commit()?;

        tracing::debug!(payment_id = %payment.id, invoice = %payment.invoice_number, "payment stored");
        Ok(())
    }

    fn replace(&self, payment: &Payment) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = write_tx(&mut conn)?;

        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM payments WHERE id = ?", [payment.id.to_string()], |r| r.get(0))
            .optional()?;
        if exists.is_none() {
            return Err(FeeError::not_found("payment", payment.id));
        }
        check(&tx, payment)?;

        tx.execute(
            "UPDATE payments SET invoice_number = ?, student_id = ?, document = ? WHERE id = ?",
            params![
                payment.invoice_number,
                payment.student_id.to_string(),
                serde_json::to_string(payment)?,
                payment.id.to_string()
            ],
        )
        .map_err(|e| constraint_conflict(e, payment))?;

        tx.execute(
            "DELETE FROM payment_months WHERE payment_id = ?",
            [payment.id.to_string()],
        )?;
        index_months(&tx, payment)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: PaymentId) -> Result<Option<Payment>> {
        let mut conn = self.conn.lock();
        let tx = write_tx(&mut conn)?;

        let document: Option<String> = tx
            .query_row("SELECT document FROM payments WHERE id = ?", [id.to_string()], |r| r.get(0))
            .optional()?;
        let Some(document) = document else {
            return Ok(None);
        };

        tx.execute("DELETE FROM payment_months WHERE payment_id = ?", [id.to_string()])?;
        tx.execute("DELETE FROM payments WHERE id = ?", [id.to_string()])?;
        tx.commit()?;
        decode(&document).map(Some)
    }

    fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let conn = self.conn.lock();
        let document: Option<String> = conn
            .query_row("SELECT document FROM payments WHERE id = ?", [id.to_string()], |r| r.get(0))
            .optional()?;
        document.as_deref().map(decode).transpose()
    }

    fn list(&self) -> Result<Vec<Payment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT document FROM payments ORDER BY rowid")?;
        let documents = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        documents.iter().map(|d| decode(d)).collect()
    }

    fn list_for_student(&self, student_id: StudentId) -> Result<Vec<Payment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT document FROM payments WHERE student_id = ? ORDER BY rowid")?;
        let documents = stmt
            .query_map([student_id.to_string()], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        documents.iter().map(|d| decode(d)).collect()
    }

    fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM payments", [], |r| r.get(0))?;
        Ok(n as u64)
    }
}
