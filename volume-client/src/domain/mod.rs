pub mod aggregate;
pub mod period;
pub mod reading;

pub use aggregate::AggregateRow;
pub use period::{PeriodToken, UnknownPeriod};
pub use reading::{Reading, ReadingKind};
