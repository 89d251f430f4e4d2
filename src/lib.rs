pub mod catalog;
pub mod config;
pub mod decimal;
pub mod discount;
pub mod enrollment;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod paid;
pub mod payments;
pub mod report;
pub mod roster;
pub mod store;
pub mod summary;
pub mod types;
pub mod views;

// re-export key types
pub use catalog::{Batch, Catalog, Course, Month};
pub use config::{CurrencyConfig, InvoiceConfig, LedgerConfig, PaymentRules};
pub use decimal::{Money, Rate};
pub use discount::{allocate_discount, DiscountAllocation, DiscountRequest, FeeLine, FeePreview};
pub use enrollment::{resolve_billable_months, BillableMonth, EnrolledCourse};
pub use errors::{ErrorKind, FeeError, Result};
pub use events::{Event, EventStore};
pub use ledger::{FeeLedger, PaymentFilter};
pub use paid::{paid_month_ids, PaidMonths};
pub use payments::{MonthPayment, Payment, PaymentDocument, PaymentRequest, PaymentUpdate};
pub use report::{Report, ReportFilter, ReportPeriod, ReportRow};
pub use roster::{Enrollment, Roster, Student};
pub use store::{MemoryStore, PaymentStore, SqliteStore};
pub use summary::StudentFeeSummary;
pub use types::{BatchId, CourseId, DiscountType, MonthId, PaymentId, PaymentStatus, StudentId};
pub use views::{InvoiceView, MonthLine, PaymentView, StudentRef};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
