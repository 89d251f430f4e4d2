use hourglass_rs::SafeTimeProvider;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::catalog::{Batch, Catalog, Course, Month};
use crate::config::LedgerConfig;
use crate::discount::{self, DiscountRequest, FeeLine, FeePreview};
use crate::enrollment::{resolve_billable_months, student_courses, BillableMonth, EnrolledCourse};
use crate::errors::{FeeError, Result};
use crate::events::{Event, EventStore};
use crate::paid::{paid_month_ids, partition_billable, PaidMonths};
use crate::payments::{aggregate, validate_breakdown, Payment, PaymentRequest, PaymentUpdate};
use crate::report::{generate_report, Report, ReportFilter};
use crate::roster::{Enrollment, Roster, Student};
use crate::store::{MemoryStore, PaymentStore};
use crate::summary::{summarize, StudentFeeSummary};
use crate::types::{BatchId, CourseId, MonthId, PaymentId, PaymentStatus, StudentId};
use crate::views::{project_payment, InvoiceView, PaymentView};

/// payment listing filter, `GET payments?hasDiscount=true`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    pub discounted_only: bool,
    pub student_id: Option<StudentId>,
}

/// selected months checked against billability and payment history
struct Selection {
    lines: Vec<FeeLine>,
    skipped: Vec<MonthId>,
}

/// fee ledger over a catalog, a roster and a payment store
///
/// Reference data is edited through `&mut self`. Payment operations take
/// `&self`; the store serializes conflicting writes.
pub struct FeeLedger<S: PaymentStore = MemoryStore> {
    config: LedgerConfig,
    catalog: Catalog,
    roster: Roster,
    store: S,
    events: Mutex<EventStore>,
}

impl FeeLedger<MemoryStore> {
    pub fn in_memory(config: LedgerConfig) -> Result<Self> {
        Self::new(config, MemoryStore::new())
    }
}

impl<S: PaymentStore> FeeLedger<S> {
    pub fn new(config: LedgerConfig, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            catalog: Catalog::new(),
            roster: Roster::new(),
            store,
            events: Mutex::new(EventStore::new()),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // reference data

    pub fn add_batch(&mut self, batch: Batch) -> Result<BatchId> {
        self.catalog.add_batch(batch)
    }

    pub fn add_course(&mut self, course: Course) -> Result<CourseId> {
        self.catalog.add_course(course)
    }

    pub fn add_month(&mut self, month: Month) -> Result<MonthId> {
        self.catalog.add_month(month)
    }

    pub fn add_student(&mut self, student: Student) -> Result<StudentId> {
        self.roster.add_student(student, &self.catalog)
    }

    pub fn enroll(&mut self, student_id: StudentId, enrollment: Enrollment) -> Result<()> {
        self.roster.enroll(student_id, enrollment, &self.catalog)
    }

    pub fn student(&self, id: StudentId) -> Result<&Student> {
        self.roster.get(id).ok_or_else(|| FeeError::not_found("student", id))
    }

    pub fn search_students(&self, term: &str) -> Vec<&Student> {
        self.roster.search(term)
    }

    // resolution

    pub fn billable_months(&self, student_id: StudentId) -> Result<Vec<BillableMonth>> {
        Ok(resolve_billable_months(self.student(student_id)?, &self.catalog))
    }

    pub fn student_courses(&self, student_id: StudentId) -> Result<Vec<EnrolledCourse>> {
        Ok(student_courses(self.student(student_id)?, &self.catalog))
    }

    pub fn paid_months(&self, student_id: StudentId) -> Result<PaidMonths> {
        self.student(student_id)?;
        Ok(paid_month_ids(&self.store.list_for_student(student_id)?))
    }

    /// billable months minus paid months, catalog order
    pub fn unpaid_months(&self, student_id: StudentId) -> Result<Vec<BillableMonth>> {
        let billable = self.billable_months(student_id)?;
        let paid = self.paid_months(student_id)?;
        let (_, unpaid) = partition_billable(billable, &paid);
        Ok(unpaid)
    }

    /// validate a selection and turn it into fee lines, selection order
    fn select(&self, student: &Student, selection: &[MonthId]) -> Result<Selection> {
        let billable: HashMap<MonthId, BillableMonth> = resolve_billable_months(student, &self.catalog)
            .into_iter()
            .map(|m| (m.id(), m))
            .collect();
        let paid = paid_month_ids(&self.store.list_for_student(student.id)?).to_set();

        let mut seen = HashSet::new();
        let mut lines = Vec::new();
        let mut skipped = Vec::new();
        for &month_id in selection {
            if !seen.insert(month_id) {
                continue;
            }
            let month = billable.get(&month_id).ok_or(FeeError::MonthNotBillable {
                student_id: student.id,
                month_id,
            })?;
            if paid.contains(&month_id) {
                skipped.push(month_id);
            } else {
                lines.push(FeeLine::from(month));
            }
        }

        if !skipped.is_empty() && !self.config.payment.skip_paid_months {
            return Err(FeeError::AlreadyPaid {
                student_id: student.id,
                month_ids: skipped,
            });
        }
        if lines.is_empty() {
            return Err(FeeError::EmptySelection);
        }
        Ok(Selection { lines, skipped })
    }

    /// what the selection would cost, through the same allocator as `create_payment`
    pub fn preview(
        &self,
        student_id: StudentId,
        selection: &[MonthId],
        discount: &DiscountRequest,
    ) -> Result<FeePreview> {
        let student = self.student(student_id)?;
        let selected = self.select(student, selection)?;
        Ok(discount::preview(&selected.lines, discount))
    }

    // invoice numbering

    /// the number the next payment will get, without consuming it
    pub fn next_invoice_number(&self) -> Result<String> {
        let sequence = self.config.invoice.start_sequence + self.store.peek_invoice_sequence()?;
        Ok(self.config.invoice.format(sequence))
    }

    /// consume the next value of the store's sequence
    fn issue_invoice_number(&self) -> Result<String> {
        let sequence = self.config.invoice.start_sequence + self.store.next_invoice_sequence()?;
        let invoice_number = self.config.invoice.format(sequence);
        self.emit(Event::InvoiceNumberIssued {
            invoice_number: invoice_number.clone(),
            sequence,
        });
        Ok(invoice_number)
    }

    // payments

    /// record a payment for the selected unpaid months
    pub fn create_payment(&self, request: PaymentRequest, time_provider: &SafeTimeProvider) -> Result<Payment> {
        let now = time_provider.now();
        let student = self
            .roster
            .get(request.student_id)
            .ok_or_else(|| FeeError::validation(format!("student {} does not exist", request.student_id)))?;

        if request.selected_months.is_empty() {
            return Err(FeeError::EmptySelection);
        }
        let selection = self.select(student, &request.selected_months)?;
        if !selection.skipped.is_empty() {
            tracing::warn!(
                student_id = %student.id,
                skipped = selection.skipped.len(),
                "dropping already paid months from selection"
            );
            self.emit(Event::PaidMonthsSkipped {
                student_id: student.id,
                month_ids: selection.skipped.clone(),
                timestamp: now,
            });
        }

        let breakdown = aggregate(&selection.lines, &request.discount())?;
        if !breakdown.paid_amount.is_positive() && !self.config.payment.allow_zero_payment {
            return Err(FeeError::InvalidPaymentAmount {
                amount: breakdown.paid_amount,
            });
        }

        let attempts = self.config.payment.max_invoice_attempts;
        for attempt in 1..=attempts {
            let invoice_number = match &request.invoice_number {
                Some(number) => number.clone(),
                None => self.issue_invoice_number()?,
            };

            let payment = Payment {
                id: Uuid::new_v4(),
                invoice_number,
                student_id: student.id,
                paid_amount: breakdown.paid_amount,
                discount_amount: breakdown.discount_amount,
                discount_type: breakdown.discount_type,
                discount_months: breakdown.discount_months.clone(),
                month_payments: breakdown.month_payments.clone(),
                legacy_months: Vec::new(),
                reference: request.reference.clone(),
                received_by: request.received_by.clone(),
                created_at: now,
                updated_at: None,
            };

            match self.store.insert(&payment) {
                Ok(()) => {
                    tracing::info!(
                        payment_id = %payment.id,
                        invoice = %payment.invoice_number,
                        paid = %payment.paid_amount,
                        discount = %payment.discount_amount,
                        "payment recorded"
                    );
                    self.emit(Event::PaymentRecorded {
                        payment_id: payment.id,
                        student_id: payment.student_id,
                        invoice_number: payment.invoice_number.clone(),
                        paid_amount: payment.paid_amount,
                        discount_amount: payment.discount_amount,
                        month_count: payment.month_count(),
                        timestamp: now,
                    });
                    return Ok(payment);
                }
                Err(FeeError::DuplicateInvoice { invoice_number }) => {
                    tracing::warn!(invoice = %invoice_number, attempt, "invoice number collision");
                    self.emit(Event::InvoiceCollision {
                        invoice_number: invoice_number.clone(),
                        attempt,
                    });
                    if request.invoice_number.is_some() {
                        return Err(FeeError::DuplicateInvoice { invoice_number });
                    }
                }
                Err(err @ FeeError::AlreadyPaid { .. }) => {
                    self.report_conflict(&err, now);
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(FeeError::InvoiceSequenceExhausted { attempts })
    }

    pub fn get_payment(&self, id: PaymentId) -> Result<PaymentView> {
        let payment = self.load(id)?;
        Ok(project_payment(&payment, &self.catalog, &self.roster))
    }

    /// resolved payments, newest first
    pub fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<PaymentView>> {
        let mut payments = match filter.student_id {
            Some(student_id) => self.store.list_for_student(student_id)?,
            None => self.store.list()?,
        };
        if filter.discounted_only {
            payments.retain(|p| p.has_discount());
        }
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments
            .iter()
            .map(|p| project_payment(p, &self.catalog, &self.roster))
            .collect())
    }

    pub fn invoice(&self, id: PaymentId) -> Result<InvoiceView> {
        let view = self.get_payment(id)?;
        Ok(InvoiceView::from_view(view, &self.config.currency))
    }

    /// administrative override; a new breakdown replaces the old one and drives the totals
    pub fn update_payment(
        &self,
        id: PaymentId,
        update: PaymentUpdate,
        time_provider: &SafeTimeProvider,
    ) -> Result<Payment> {
        let current = self.load(id)?;
        if update.is_empty() {
            return Ok(current);
        }
        let now = time_provider.now();

        let mut updated = current.clone();
        if let Some(reference) = update.reference {
            updated.reference = Some(reference);
        }
        if let Some(received_by) = update.received_by {
            updated.received_by = received_by;
        }
        if let Some(discount_type) = update.discount_type {
            updated.discount_type = discount_type;
        }
        if let Some(month_payments) = update.month_payments {
            if month_payments.is_empty() {
                return Err(FeeError::validation("breakdown must cover at least one month"));
            }
            validate_breakdown(&month_payments)?;
            let covered: HashSet<MonthId> = month_payments.iter().map(|mp| mp.month_id).collect();
            updated.legacy_months.retain(|m| !covered.contains(m));
            updated.month_payments = month_payments;
            updated.recompute_totals();
        }
        updated.updated_at = Some(now);

        if let Err(err) = self.store.replace(&updated) {
            if matches!(err, FeeError::AlreadyPaid { .. }) {
                self.report_conflict(&err, now);
            }
            return Err(err);
        }

        tracing::info!(
            payment_id = %id,
            old_paid = %current.paid_amount,
            new_paid = %updated.paid_amount,
            "payment adjusted"
        );
        self.emit(Event::PaymentAdjusted {
            payment_id: id,
            old_paid_amount: current.paid_amount,
            new_paid_amount: updated.paid_amount,
            timestamp: now,
        });
        Ok(updated)
    }

    /// remove a payment and free its months
    pub fn delete_payment(&self, id: PaymentId) -> Result<Payment> {
        let removed = self
            .store
            .delete(id)?
            .ok_or_else(|| FeeError::not_found("payment", id))?;

        tracing::info!(payment_id = %id, invoice = %removed.invoice_number, "payment voided");
        self.emit(Event::PaymentVoided {
            payment_id: id,
            invoice_number: removed.invoice_number.clone(),
            released_months: removed.month_ids().collect(),
        });
        Ok(removed)
    }

    // read side

    pub fn report(&self, filter: &ReportFilter) -> Result<Report> {
        Ok(generate_report(&self.store.list()?, &self.catalog, &self.roster, filter))
    }

    pub fn student_summary(&self, student_id: StudentId) -> Result<StudentFeeSummary> {
        let student = self.student(student_id)?;
        let history = self.store.list_for_student(student_id)?;
        Ok(summarize(student, &self.catalog, &history))
    }

    /// roster entries whose summary has the given status
    pub fn students_by_status(&self, status: PaymentStatus) -> Result<Vec<&Student>> {
        let mut by_student: HashMap<StudentId, Vec<Payment>> = HashMap::new();
        for payment in self.store.list()? {
            by_student.entry(payment.student_id).or_default().push(payment);
        }

        Ok(self
            .roster
            .students()
            .iter()
            .filter(|s| {
                let history = by_student.get(&s.id).map(Vec::as_slice).unwrap_or(&[]);
                summarize(s, &self.catalog, history).status == status
            })
            .collect())
    }

    /// drain collected events
    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().take_events()
    }

    fn load(&self, id: PaymentId) -> Result<Payment> {
        self.store.get(id)?.ok_or_else(|| FeeError::not_found("payment", id))
    }

    fn emit(&self, event: Event) {
        self.events.lock().emit(event);
    }

    fn report_conflict(&self, err: &FeeError, now: chrono::DateTime<chrono::Utc>) {
        if let FeeError::AlreadyPaid { student_id, month_ids } = err {
            tracing::warn!(student_id = %student_id, months = month_ids.len(), "months already paid");
            self.emit(Event::PaymentConflict {
                student_id: *student_id,
                month_ids: month_ids.clone(),
                timestamp: now,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::payments::MonthPayment;
    use crate::report::ReportPeriod;
    use crate::store::SqliteStore;
    use crate::types::DiscountType;
    use chrono::{Duration, TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    struct School<S: PaymentStore> {
        ledger: FeeLedger<S>,
        student: StudentId,
        months: Vec<MonthId>,
        chemistry_jan: MonthId,
    }

    fn clock() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()))
    }

    fn school_with<S: PaymentStore>(config: LedgerConfig, store: S) -> School<S> {
        let mut ledger = FeeLedger::new(config, store).unwrap();
        let batch = ledger.add_batch(Batch::new("HSC 2025")).unwrap();
        let physics = ledger
            .add_course(Course::new("Physics", Money::from_major(1000), batch))
            .unwrap();
        let chemistry = ledger
            .add_course(Course::new("Chemistry", Money::from_major(900), batch))
            .unwrap();
        let months: Vec<MonthId> = [(1, 1000), (2, 1200), (3, 1000), (4, 1000)]
            .iter()
            .map(|&(n, fee)| {
                ledger
                    .add_month(Month::new(format!("Month {}", n), n, Money::from_major(fee), physics))
                    .unwrap()
            })
            .collect();
        let chemistry_jan = ledger
            .add_month(Month::new("January", 1, Money::from_major(900), chemistry))
            .unwrap();

        // enrolled in physics months 1..=3 only
        let student = ledger
            .add_student(
                Student::new("HSC-001", "Nusrat Jahan")
                    .with_batch(batch)
                    .with_phone("01711000000")
                    .with_enrollment(Enrollment::bounded(physics, months[0], months[2])),
            )
            .unwrap();

        School {
            ledger,
            student,
            months,
            chemistry_jan,
        }
    }

    fn school() -> School<MemoryStore> {
        school_with(LedgerConfig::standard(), MemoryStore::new())
    }

    #[test]
    fn test_end_to_end_percentage_payment() {
        let s = school();
        let time = clock();

        assert_eq!(s.ledger.unpaid_months(s.student).unwrap().len(), 3);

        let request = PaymentRequest::new(s.student, s.months[..3].to_vec(), "Admin")
            .with_discount(DiscountRequest::percentage(dec!(10), vec![]))
            .with_reference("cash");
        let payment = s.ledger.create_payment(request, &time).unwrap();

        assert_eq!(payment.invoice_number, "INV000001");
        assert_eq!(payment.paid_amount, Money::from_major(2880));
        assert_eq!(payment.discount_amount, Money::from_major(320));
        assert_eq!(payment.created_at, time.now());
        assert!(s.ledger.unpaid_months(s.student).unwrap().is_empty());
        assert_eq!(s.ledger.paid_months(s.student).unwrap().paid_month_ids.len(), 3);

        let events = s.ledger.take_events();
        assert!(events.iter().any(|e| matches!(e, Event::InvoiceNumberIssued { sequence: 1, .. })));
        assert!(events.iter().any(|e| matches!(e, Event::PaymentRecorded { month_count: 3, .. })));
        assert!(s.ledger.take_events().is_empty());
    }

    #[test]
    fn test_preview_matches_created_payment() {
        let s = school();
        let discount = DiscountRequest::fixed(Money::from_major(250), vec![s.months[0], s.months[1]]);
        let selection = s.months[..3].to_vec();

        let preview = s.ledger.preview(s.student, &selection, &discount).unwrap();
        let payment = s
            .ledger
            .create_payment(
                PaymentRequest::new(s.student, selection, "Admin").with_discount(discount),
                &clock(),
            )
            .unwrap();

        assert_eq!(preview.due_amount, payment.paid_amount);
        assert_eq!(preview.discount_amount, payment.discount_amount);
        assert_eq!(preview.total_amount, payment.gross_amount());
    }

    #[test]
    fn test_paid_months_are_skipped_by_default() {
        let s = school();
        let time = clock();
        s.ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[0]], "Admin"), &time)
            .unwrap();
        s.ledger.take_events();

        let second = s
            .ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[0], s.months[1]], "Admin"), &time)
            .unwrap();
        assert_eq!(second.month_ids().collect::<Vec<_>>(), vec![s.months[1]]);
        assert_eq!(second.invoice_number, "INV000002");
        assert!(s
            .ledger
            .take_events()
            .iter()
            .any(|e| matches!(e, Event::PaidMonthsSkipped { month_ids, .. } if month_ids == &vec![s.months[0]])));

        // only paid months left in the selection
        let err = s
            .ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[0]], "Admin"), &time)
            .unwrap_err();
        assert!(matches!(err, FeeError::EmptySelection));
    }

    #[test]
    fn test_strict_config_rejects_paid_months() {
        let s = school_with(LedgerConfig::strict(), MemoryStore::new());
        let time = clock();
        s.ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[0]], "Admin"), &time)
            .unwrap();

        let err = s
            .ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[0], s.months[1]], "Admin"), &time)
            .unwrap_err();
        assert!(matches!(err, FeeError::AlreadyPaid { ref month_ids, .. } if month_ids == &vec![s.months[0]]));
        assert_eq!(err.status_code(), 409);
        assert!(err.is_retryable());
        assert_eq!(s.ledger.store().count().unwrap(), 1);
    }

    #[test]
    fn test_request_validation() {
        let s = school();
        let time = clock();

        let err = s
            .ledger
            .create_payment(PaymentRequest::new(Uuid::new_v4(), vec![s.months[0]], "Admin"), &time)
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = s
            .ledger
            .create_payment(PaymentRequest::new(s.student, vec![], "Admin"), &time)
            .unwrap_err();
        assert!(matches!(err, FeeError::EmptySelection));

        // month 4 is outside the enrollment; chemistry is not enrolled at all
        for month_id in [s.months[3], s.chemistry_jan] {
            let err = s
                .ledger
                .create_payment(PaymentRequest::new(s.student, vec![month_id], "Admin"), &time)
                .unwrap_err();
            assert!(matches!(err, FeeError::MonthNotBillable { .. }));
        }

        assert!(matches!(
            s.ledger.paid_months(Uuid::new_v4()),
            Err(FeeError::NotFound { .. })
        ));
        assert_eq!(s.ledger.store().count().unwrap(), 0);
    }

    #[test]
    fn test_fully_discounted_payment() {
        let s = school();
        let request = PaymentRequest::new(s.student, vec![s.months[0]], "Admin")
            .with_discount(DiscountRequest::fixed(Money::from_major(5000), vec![]));

        let err = s.ledger.create_payment(request.clone(), &clock()).unwrap_err();
        assert!(matches!(err, FeeError::InvalidPaymentAmount { .. }));

        let mut config = LedgerConfig::standard();
        config.payment.allow_zero_payment = true;
        let lenient = school_with(config, MemoryStore::new());
        let request = PaymentRequest::new(lenient.student, vec![lenient.months[0]], "Admin")
            .with_discount(DiscountRequest::fixed(Money::from_major(5000), vec![]));
        let payment = lenient.ledger.create_payment(request, &clock()).unwrap();
        assert_eq!(payment.paid_amount, Money::ZERO);
        assert_eq!(payment.discount_amount, Money::from_major(1000));
    }

    #[test]
    fn test_caller_invoice_number_is_not_retried() {
        let s = school();
        let time = clock();
        let mut first = PaymentRequest::new(s.student, vec![s.months[0]], "Admin");
        first.invoice_number = Some("MANUAL-1".to_string());
        s.ledger.create_payment(first, &time).unwrap();

        let mut second = PaymentRequest::new(s.student, vec![s.months[1]], "Admin");
        second.invoice_number = Some("MANUAL-1".to_string());
        let err = s.ledger.create_payment(second, &time).unwrap_err();
        assert!(matches!(err, FeeError::DuplicateInvoice { .. }));
        assert!(s
            .ledger
            .take_events()
            .iter()
            .any(|e| matches!(e, Event::InvoiceCollision { attempt: 1, .. })));
    }

    #[test]
    fn test_next_invoice_number_does_not_consume() {
        let mut config = LedgerConfig::standard();
        config.invoice.start_sequence = 41;
        let s = school_with(config, MemoryStore::new());

        let first = s.ledger.next_invoice_number().unwrap();
        let second = s.ledger.next_invoice_number().unwrap();
        assert_eq!(first, "INV000042");
        assert_eq!(first, second);
        assert!(s.ledger.take_events().is_empty());

        let payment = s
            .ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[0]], "Admin"), &clock())
            .unwrap();
        assert_eq!(payment.invoice_number, first);
        assert_eq!(s.ledger.next_invoice_number().unwrap(), "INV000043");
    }

    #[test]
    fn test_generated_number_collision_retries() {
        let mut config = LedgerConfig::standard();
        config.invoice.start_sequence = 99;
        let s = school_with(config, MemoryStore::new());
        let time = clock();

        // a manual number occupying the next generated one
        let mut manual = PaymentRequest::new(s.student, vec![s.months[0]], "Admin");
        manual.invoice_number = Some("INV000100".to_string());
        s.ledger.create_payment(manual, &time).unwrap();

        let payment = s
            .ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[1]], "Admin"), &time)
            .unwrap();
        assert_eq!(payment.invoice_number, "INV000101");
    }

    #[test]
    fn test_update_and_delete() {
        let s = school();
        let time = clock();
        let control = time.test_control().unwrap();
        let payment = s
            .ledger
            .create_payment(PaymentRequest::new(s.student, s.months[..2].to_vec(), "Admin"), &time)
            .unwrap();

        control.advance(Duration::days(2));
        let update = PaymentUpdate {
            reference: Some("bkash TX-42".to_string()),
            discount_type: Some(DiscountType::Fixed),
            month_payments: Some(vec![MonthPayment {
                month_id: s.months[0],
                month_fee: Money::from_major(1000),
                discount_amount: Money::from_major(200),
                paid_amount: Money::from_major(800),
            }]),
            ..PaymentUpdate::default()
        };
        let updated = s.ledger.update_payment(payment.id, update, &time).unwrap();
        assert_eq!(updated.paid_amount, Money::from_major(800));
        assert_eq!(updated.discount_amount, Money::from_major(200));
        assert_eq!(updated.updated_at, Some(time.now()));
        // February is free again
        assert_eq!(s.ledger.unpaid_months(s.student).unwrap().len(), 2);

        let unbalanced = PaymentUpdate {
            month_payments: Some(vec![MonthPayment {
                month_id: s.months[0],
                month_fee: Money::from_major(1000),
                discount_amount: Money::ZERO,
                paid_amount: Money::from_major(900),
            }]),
            ..PaymentUpdate::default()
        };
        assert!(s.ledger.update_payment(payment.id, unbalanced, &time).is_err());

        let removed = s.ledger.delete_payment(payment.id).unwrap();
        assert_eq!(removed.reference.as_deref(), Some("bkash TX-42"));
        assert_eq!(s.ledger.unpaid_months(s.student).unwrap().len(), 3);
        assert!(matches!(s.ledger.delete_payment(payment.id), Err(FeeError::NotFound { .. })));
        assert!(matches!(s.ledger.get_payment(payment.id), Err(FeeError::NotFound { .. })));

        let events = s.ledger.take_events();
        assert!(events.iter().any(|e| matches!(e, Event::PaymentAdjusted { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PaymentVoided { released_months, .. } if released_months.len() == 1)));
    }

    #[test]
    fn test_update_cannot_steal_paid_month() {
        let s = school();
        let time = clock();
        let first = s
            .ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[0]], "Admin"), &time)
            .unwrap();
        s.ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[1]], "Admin"), &time)
            .unwrap();

        let update = PaymentUpdate {
            month_payments: Some(vec![MonthPayment {
                month_id: s.months[1],
                month_fee: Money::from_major(1200),
                discount_amount: Money::ZERO,
                paid_amount: Money::from_major(1200),
            }]),
            ..PaymentUpdate::default()
        };
        let err = s.ledger.update_payment(first.id, update, &time).unwrap_err();
        assert!(matches!(err, FeeError::AlreadyPaid { .. }));
        assert_eq!(s.ledger.get_payment(first.id).unwrap().payment, first);
    }

    #[test]
    fn test_listing_views_and_invoice() {
        let s = school();
        let time = clock();
        let control = time.test_control().unwrap();
        s.ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[0]], "Admin"), &time)
            .unwrap();
        control.advance(Duration::hours(1));
        let discounted = s
            .ledger
            .create_payment(
                PaymentRequest::new(s.student, vec![s.months[1]], "Admin")
                    .with_discount(DiscountRequest::fixed(Money::from_major(200), vec![])),
                &time,
            )
            .unwrap();

        let all = s.ledger.list_payments(&PaymentFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].payment.id, discounted.id);

        let only_discounted = s
            .ledger
            .list_payments(&PaymentFilter {
                discounted_only: true,
                ..PaymentFilter::default()
            })
            .unwrap();
        assert_eq!(only_discounted.len(), 1);
        assert_eq!(only_discounted[0].months[0].name, "Month 2");
        assert_eq!(only_discounted[0].months[0].course_name, "Physics");

        let invoice = s.ledger.invoice(discounted.id).unwrap();
        assert_eq!(invoice.total_amount, Money::from_major(1200));
        assert_eq!(invoice.paid_amount, Money::from_major(1000));
        assert_eq!(invoice.student.unwrap().name, "Nusrat Jahan");
    }

    #[test]
    fn test_reports_and_summaries() {
        let s = school();
        let time = clock();
        assert_eq!(
            s.ledger.student_summary(s.student).unwrap().status,
            PaymentStatus::Unpaid
        );

        s.ledger
            .create_payment(PaymentRequest::new(s.student, vec![s.months[0]], "Admin"), &time)
            .unwrap();
        let summary = s.ledger.student_summary(s.student).unwrap();
        assert_eq!(summary.status, PaymentStatus::Partial);
        assert_eq!(summary.outstanding, Money::from_major(2200));
        assert_eq!(s.ledger.students_by_status(PaymentStatus::Partial).unwrap().len(), 1);
        assert!(s.ledger.students_by_status(PaymentStatus::Paid).unwrap().is_empty());

        let march = ReportFilter::period(ReportPeriod::Month { year: 2025, month: 3 });
        let report = s.ledger.report(&march).unwrap();
        assert_eq!(report.payment_count, 1);
        assert_eq!(report.total_collected, Money::from_major(1000));

        let april = ReportFilter::period(ReportPeriod::Month { year: 2025, month: 4 });
        assert_eq!(s.ledger.report(&april).unwrap().payment_count, 0);

        assert_eq!(s.ledger.search_students("nusrat").len(), 1);
        assert_eq!(s.ledger.search_students("01711").len(), 1);
        assert_eq!(s.ledger.student_courses(s.student).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_payments_bill_a_month_once() {
        use std::sync::{Arc, Barrier};

        let s = school_with(LedgerConfig::strict(), MemoryStore::new());
        let (student, month) = (s.student, s.months[0]);
        let ledger = Arc::new(s.ledger);
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ledger.create_payment(PaymentRequest::new(student, vec![month], "Admin"), &clock())
                })
            })
            .collect();
        let results: Vec<Result<Payment>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(err, FeeError::AlreadyPaid { month_ids, .. } if month_ids == &vec![month]));
        }
        assert_eq!(ledger.store().count().unwrap(), 1);
        assert_eq!(ledger.paid_months(student).unwrap().paid_month_ids.len(), 1);
    }

    #[test]
    fn test_ledger_over_sqlite() {
        let s = school_with(LedgerConfig::standard(), SqliteStore::open_in_memory().unwrap());
        let time = clock();
        let payment = s
            .ledger
            .create_payment(
                PaymentRequest::new(s.student, s.months[..3].to_vec(), "Admin")
                    .with_discount(DiscountRequest::fixed(Money::from_major(100), vec![])),
                &time,
            )
            .unwrap();
        assert_eq!(payment.discount_amount, Money::from_major(100));

        let stored = s.ledger.get_payment(payment.id).unwrap().payment;
        assert_eq!(stored, payment);
        assert!(s.ledger.unpaid_months(s.student).unwrap().is_empty());
    }
}
