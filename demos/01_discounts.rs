/// discounts - fixed and percentage discounts, previewed then recorded
use tuition_fees_rs::chrono::{TimeZone, Utc};
use tuition_fees_rs::{
    Batch, Course, Decimal, DiscountRequest, Enrollment, FeeLedger, LedgerConfig, Money, Month,
    PaymentRequest, SafeTimeProvider, Student, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()));
    let mut ledger = FeeLedger::in_memory(LedgerConfig::standard())?;

    let batch = ledger.add_batch(Batch::new("SSC 2026"))?;
    let math = ledger.add_course(Course::new("Higher Math", Money::from_major(1000), batch))?;
    let jan = ledger.add_month(Month::new("January", 1, Money::from_major(1000), math))?;
    let feb = ledger.add_month(Month::new("February", 2, Money::from_major(1200), math))?;
    let mar = ledger.add_month(Month::new("March", 3, Money::from_major(1000), math))?;

    let first = ledger.add_student(
        Student::new("SSC-014", "Tanvir Hasan").with_enrollment(Enrollment::bounded(math, jan, mar)),
    )?;
    let second = ledger.add_student(
        Student::new("SSC-015", "Mim Akter").with_enrollment(Enrollment::bounded(math, jan, mar)),
    )?;
    let all = vec![jan, feb, mar];

    // fixed amount spread over the targeted months by fee
    let fixed = DiscountRequest::fixed(Money::from_major(500), vec![jan, feb]);
    let preview = ledger.preview(first, &all, &fixed)?;
    println!("fixed preview: total {} discount {} due {}", preview.total_amount, preview.discount_amount, preview.due_amount);
    for line in &preview.lines {
        println!("  {} fee {} discount {}", line.month_id, line.fee, line.discount);
    }

    let payment = ledger.create_payment(
        PaymentRequest::new(first, all.clone(), "accounts").with_discount(fixed),
        &time,
    )?;
    println!("recorded {} paid {}", payment.invoice_number, payment.paid_amount);

    // ten percent off every selected month
    let percent = DiscountRequest::percentage(Decimal::from(10), vec![]);
    let payment = ledger.create_payment(
        PaymentRequest::new(second, all, "accounts").with_discount(percent),
        &time,
    )?;
    println!("recorded {} paid {} discount {}", payment.invoice_number, payment.paid_amount, payment.discount_amount);

    let invoice = ledger.invoice(payment.id)?;
    println!("{}", invoice.to_json_pretty()?);

    for event in ledger.take_events() {
        println!("{:?}", event);
    }

    Ok(())
}
