/// quick start - one course, one student, one payment
use tuition_fees_rs::{
    Batch, Course, Enrollment, FeeLedger, LedgerConfig, Money, Month, PaymentRequest,
    SafeTimeProvider, Student, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::System);
    let mut ledger = FeeLedger::in_memory(LedgerConfig::standard())?;

    // a batch with one course billed over three months
    let batch = ledger.add_batch(Batch::new("HSC 2025"))?;
    let physics = ledger.add_course(Course::new("Physics", Money::from_major(1000), batch))?;
    let mut months = Vec::new();
    for (number, name) in ["January", "February", "March"].iter().enumerate() {
        months.push(ledger.add_month(Month::new(*name, number as u32 + 1, Money::from_major(1000), physics))?);
    }

    let student = ledger.add_student(
        Student::new("HSC-001", "Nusrat Jahan")
            .with_batch(batch)
            .with_enrollment(Enrollment::open_ended(physics, months[0])),
    )?;

    // pay the first two months
    let payment = ledger.create_payment(
        PaymentRequest::new(student, months[..2].to_vec(), "front desk").with_reference("cash"),
        &time,
    )?;
    println!("{}", serde_json::to_string_pretty(&payment)?);

    let unpaid = ledger.unpaid_months(student)?;
    println!("still unpaid: {:?}", unpaid.iter().map(|m| &m.month.name).collect::<Vec<_>>());

    Ok(())
}
