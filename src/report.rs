//! Collection reports over stored payments.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Month};
use crate::decimal::Money;
use crate::payments::Payment;
use crate::roster::Roster;
use crate::types::{BatchId, CourseId, MonthId, PaymentId};

/// calendar window on `created_at`, evaluated on the UTC date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ReportPeriod {
    #[default]
    All,
    Day { date: NaiveDate },
    /// Monday through Sunday of an ISO week
    IsoWeek { year: i32, week: u32 },
    Month { year: i32, month: u32 },
}

impl ReportPeriod {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let date = at.date_naive();
        match *self {
            ReportPeriod::All => true,
            ReportPeriod::Day { date: day } => date == day,
            ReportPeriod::IsoWeek { year, week } => {
                let iso = date.iso_week();
                iso.year() == year && iso.week() == week
            }
            ReportPeriod::Month { year, month } => date.year() == year && date.month() == month,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    pub period: ReportPeriod,
    pub batch_id: Option<BatchId>,
    pub course_id: Option<CourseId>,
    pub month_id: Option<MonthId>,
}

impl ReportFilter {
    pub fn period(period: ReportPeriod) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_course(mut self, course_id: CourseId) -> Self {
        self.course_id = Some(course_id);
        self
    }

    pub fn with_month(mut self, month_id: MonthId) -> Self {
        self.month_id = Some(month_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub payment_id: PaymentId,
    pub invoice_number: String,
    pub created_at: DateTime<Utc>,
    pub student_name: String,
    pub student_code: String,
    /// whole payment, or the month's share under a month filter
    pub amount: Money,
    pub discount: Money,
    pub received_by: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub rows: Vec<ReportRow>,
    /// catalog months matching the batch/course/month filters
    pub months: Vec<Month>,
    pub total_collected: Money,
    pub total_discount: Money,
    pub payment_count: usize,
}

fn matches_batch(payment: &Payment, batch_id: BatchId, catalog: &Catalog, roster: &Roster) -> bool {
    let student_in_batch = roster
        .get(payment.student_id)
        .map_or(false, |s| s.batch_id == Some(batch_id));
    student_in_batch
        || payment
            .month_ids()
            .any(|m| catalog.batch_of_month(m).map_or(false, |b| b.id == batch_id))
}

fn matches_course(payment: &Payment, course_id: CourseId, catalog: &Catalog) -> bool {
    payment
        .month_ids()
        .any(|m| catalog.month(m).map_or(false, |month| month.course_id == course_id))
}

fn report_months(catalog: &Catalog, filter: &ReportFilter) -> Vec<Month> {
    catalog
        .months()
        .iter()
        .filter(|m| filter.month_id.map_or(true, |id| m.id == id))
        .filter(|m| filter.course_id.map_or(true, |id| m.course_id == id))
        .filter(|m| {
            filter
                .batch_id
                .map_or(true, |id| catalog.batch_of_month(m.id).map_or(false, |b| b.id == id))
        })
        .cloned()
        .collect()
}

/// filter payments and total what they collected, oldest first
pub fn generate_report<'a, I>(payments: I, catalog: &Catalog, roster: &Roster, filter: &ReportFilter) -> Report
where
    I: IntoIterator<Item = &'a Payment>,
{
    let mut rows: Vec<ReportRow> = Vec::new();

    for payment in payments {
        if !filter.period.contains(payment.created_at) {
            continue;
        }
        if let Some(batch_id) = filter.batch_id {
            if !matches_batch(payment, batch_id, catalog, roster) {
                continue;
            }
        }
        if let Some(course_id) = filter.course_id {
            if !matches_course(payment, course_id, catalog) {
                continue;
            }
        }

        let (amount, discount) = match filter.month_id {
            Some(month_id) => match payment.month_share(month_id) {
                Some(share) => share,
                None => continue,
            },
            None => (payment.paid_amount, payment.discount_amount),
        };

        let student = roster.get(payment.student_id);
        rows.push(ReportRow {
            payment_id: payment.id,
            invoice_number: payment.invoice_number.clone(),
            created_at: payment.created_at,
            student_name: student.map_or_else(String::new, |s| s.name.clone()),
            student_code: student.map_or_else(String::new, |s| s.student_code.clone()),
            amount,
            discount,
            received_by: payment.received_by.clone(),
            reference: payment.reference.clone(),
        });
    }

    rows.sort_by_key(|r| r.created_at);

    let total_collected = rows.iter().map(|r| r.amount).sum();
    let total_discount = rows.iter().map(|r| r.discount).sum();
    tracing::debug!(rows = rows.len(), "collection report generated");

    Report {
        payment_count: rows.len(),
        months: report_months(catalog, filter),
        rows,
        total_collected,
        total_discount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Batch, Course};
    use crate::payments::MonthPayment;
    use crate::roster::Student;
    use crate::types::{DiscountType, StudentId};
    use chrono::TimeZone;
    use uuid::Uuid;

    struct Fixture {
        catalog: Catalog,
        roster: Roster,
        hsc: BatchId,
        physics: CourseId,
        chemistry: CourseId,
        phy_jan: MonthId,
        phy_feb: MonthId,
        chem_jan: MonthId,
        alice: StudentId,
        bob: StudentId,
    }

    fn fixture() -> Fixture {
        let mut catalog = Catalog::new();
        let hsc = catalog.add_batch(Batch::new("HSC")).unwrap();
        let ssc = catalog.add_batch(Batch::new("SSC")).unwrap();
        let physics = catalog.add_course(Course::new("Physics", Money::from_major(1000), hsc)).unwrap();
        let chemistry = catalog.add_course(Course::new("Chemistry", Money::from_major(800), ssc)).unwrap();
        let phy_jan = catalog.add_month(Month::new("Jan", 1, Money::from_major(1000), physics)).unwrap();
        let phy_feb = catalog.add_month(Month::new("Feb", 2, Money::from_major(1000), physics)).unwrap();
        let chem_jan = catalog.add_month(Month::new("Jan", 1, Money::from_major(800), chemistry)).unwrap();

        let mut roster = Roster::new();
        let alice = roster.add_student(Student::new("A1", "Alice").with_batch(hsc), &catalog).unwrap();
        let bob = roster.add_student(Student::new("B1", "Bob"), &catalog).unwrap();

        Fixture {
            catalog,
            roster,
            hsc,
            physics,
            chemistry,
            phy_jan,
            phy_feb,
            chem_jan,
            alice,
            bob,
        }
    }

    fn paid(
        student_id: StudentId,
        invoice: &str,
        at: DateTime<Utc>,
        lines: &[(MonthId, i64, i64)],
        legacy: Vec<MonthId>,
        legacy_paid: i64,
    ) -> Payment {
        let month_payments: Vec<MonthPayment> = lines
            .iter()
            .map(|&(month_id, fee, discount)| MonthPayment {
                month_id,
                month_fee: Money::from_major(fee),
                discount_amount: Money::from_major(discount),
                paid_amount: Money::from_major(fee - discount),
            })
            .collect();
        let paid_amount: Money = month_payments.iter().map(|mp| mp.paid_amount).sum::<Money>()
            + Money::from_major(legacy_paid);
        Payment {
            id: Uuid::new_v4(),
            invoice_number: invoice.to_string(),
            student_id,
            paid_amount,
            discount_amount: month_payments.iter().map(|mp| mp.discount_amount).sum(),
            discount_type: DiscountType::Fixed,
            discount_months: vec![],
            month_payments,
            legacy_months: legacy,
            reference: None,
            received_by: "desk".to_string(),
            created_at: at,
            updated_at: None,
        }
    }

    fn history(f: &Fixture) -> Vec<Payment> {
        vec![
            paid(
                f.alice,
                "INV000002",
                Utc.with_ymd_and_hms(2025, 3, 5, 9, 0, 0).unwrap(),
                &[(f.phy_feb, 1000, 100)],
                vec![],
                0,
            ),
            // legacy-only record covering two months
            paid(
                f.alice,
                "INV000001",
                Utc.with_ymd_and_hms(2025, 2, 20, 9, 0, 0).unwrap(),
                &[],
                vec![f.phy_jan, f.chem_jan],
                1800,
            ),
            paid(
                f.bob,
                "INV000003",
                Utc.with_ymd_and_hms(2025, 3, 10, 16, 30, 0).unwrap(),
                &[(f.chem_jan, 800, 0)],
                vec![],
                0,
            ),
        ]
    }

    #[test]
    fn test_unfiltered_report() {
        let f = fixture();
        let report = generate_report(&history(&f), &f.catalog, &f.roster, &ReportFilter::default());

        assert_eq!(report.payment_count, 3);
        assert_eq!(report.rows[0].invoice_number, "INV000001");
        assert_eq!(report.total_collected, Money::from_major(3500));
        assert_eq!(report.total_discount, Money::from_major(100));
        assert_eq!(report.months.len(), 3);
    }

    #[test]
    fn test_period_filters() {
        let f = fixture();
        let payments = history(&f);

        let march = ReportFilter::period(ReportPeriod::Month { year: 2025, month: 3 });
        assert_eq!(generate_report(&payments, &f.catalog, &f.roster, &march).payment_count, 2);

        let day = ReportFilter::period(ReportPeriod::Day {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        });
        let report = generate_report(&payments, &f.catalog, &f.roster, &day);
        assert_eq!(report.payment_count, 1);
        assert_eq!(report.rows[0].student_name, "Bob");

        // 2025-03-03 (Mon) .. 2025-03-09 (Sun) is ISO week 10
        let week = ReportFilter::period(ReportPeriod::IsoWeek { year: 2025, week: 10 });
        let report = generate_report(&payments, &f.catalog, &f.roster, &week);
        assert_eq!(report.payment_count, 1);
        assert_eq!(report.rows[0].invoice_number, "INV000002");
    }

    #[test]
    fn test_batch_matches_student_or_month() {
        let f = fixture();
        let payments = history(&f);

        let hsc = ReportFilter::default().with_batch(f.hsc);
        let report = generate_report(&payments, &f.catalog, &f.roster, &hsc);
        // Alice is in HSC; Bob only paid an SSC month
        assert_eq!(report.payment_count, 2);
        assert_eq!(report.months.len(), 2);

        let ssc_batch = f.catalog.course(f.chemistry).unwrap().batch_id;
        let ssc = ReportFilter::default().with_batch(ssc_batch);
        // Alice's legacy payment covers an SSC month too
        assert_eq!(generate_report(&payments, &f.catalog, &f.roster, &ssc).payment_count, 2);
    }

    #[test]
    fn test_course_filter() {
        let f = fixture();
        let report = generate_report(
            &history(&f),
            &f.catalog,
            &f.roster,
            &ReportFilter::default().with_course(f.physics),
        );
        assert_eq!(report.payment_count, 2);
        assert!(report.rows.iter().all(|r| r.student_code == "A1"));
    }

    #[test]
    fn test_month_filter_uses_month_share() {
        let f = fixture();
        let payments = history(&f);

        let report = generate_report(
            &payments,
            &f.catalog,
            &f.roster,
            &ReportFilter::default().with_month(f.chem_jan),
        );
        assert_eq!(report.payment_count, 2);
        // legacy even split of 1800 over two months, then Bob's exact line
        assert_eq!(report.rows[0].amount, Money::from_major(900));
        assert_eq!(report.rows[1].amount, Money::from_major(800));
        assert_eq!(report.total_collected, Money::from_major(1700));
        assert_eq!(report.months.len(), 1);

        let feb = generate_report(
            &payments,
            &f.catalog,
            &f.roster,
            &ReportFilter::default().with_month(f.phy_feb),
        );
        assert_eq!(feb.rows[0].amount, Money::from_major(900));
        assert_eq!(feb.rows[0].discount, Money::from_major(100));
    }
}
