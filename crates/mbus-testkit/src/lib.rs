//! mbus-testkit
//!
//! Fakes and helpers for catch-up scenario tests. Test-only; never a
//! dependency of production crates.

mod logs;
mod sink;
mod store;

pub use logs::{capture_logs, CapturedEvent};
pub use sink::{Delivery, RecordingSink};
pub use store::{seed_record, CountingStore};
