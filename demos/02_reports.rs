/// reports - sqlite-backed ledger, collection report and student standing
use tuition_fees_rs::chrono::{Duration, TimeZone, Utc};
use tuition_fees_rs::{
    Batch, Course, Enrollment, FeeLedger, LedgerConfig, Money, Month, PaymentRequest,
    PaymentStatus, ReportFilter, ReportPeriod, SafeTimeProvider, SqliteStore, Student, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()));
    let control = time.test_control().expect("test clock");

    let config = LedgerConfig::from_json_str(r#"{ "invoice": { "prefix": "FEE-", "width": 4 } }"#)?;
    let mut ledger = FeeLedger::new(config, SqliteStore::open_in_memory()?)?;

    let batch = ledger.add_batch(Batch::new("Admission 2025"))?;
    let biology = ledger.add_course(Course::new("Biology", Money::from_major(1500), batch))?;
    let mut months = Vec::new();
    for number in 1..=4u32 {
        months.push(ledger.add_month(Month::new(format!("Month {}", number), number, Money::from_major(1500), biology))?);
    }

    let mut students = Vec::new();
    for (code, name) in [("ADM-1", "Arif"), ("ADM-2", "Sadia"), ("ADM-3", "Rafi")] {
        students.push(ledger.add_student(
            Student::new(code, name)
                .with_batch(batch)
                .with_enrollment(Enrollment::bounded(biology, months[0], months[1])),
        )?);
    }

    // one payment a week
    ledger.create_payment(PaymentRequest::new(students[0], months[..2].to_vec(), "desk"), &time)?;
    control.advance(Duration::days(7));
    ledger.create_payment(PaymentRequest::new(students[1], vec![months[0]], "desk"), &time)?;

    let january = ReportFilter::period(ReportPeriod::Month { year: 2025, month: 1 }).with_batch(batch);
    let report = ledger.report(&january)?;
    for row in &report.rows {
        println!("{} {} {} {}", row.created_at.date_naive(), row.invoice_number, row.student_name, row.amount);
    }
    println!("collected {} over {} payments", report.total_collected, report.payment_count);

    let first_month = ledger.report(&ReportFilter::default().with_month(months[0]))?;
    println!("month 1 collected {}", first_month.total_collected);

    for status in [PaymentStatus::Paid, PaymentStatus::Partial, PaymentStatus::Unpaid] {
        let names: Vec<_> = ledger.students_by_status(status)?.iter().map(|s| s.name.clone()).collect();
        println!("{:?}: {:?}", status, names);
    }

    let summary = ledger.student_summary(students[1])?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
