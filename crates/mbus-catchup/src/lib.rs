//! mbus-catchup
//!
//! Catch-up reconciliation for a key-value backed message bus.
//!
//! A subscriber that was offline recovers the messages published during the
//! outage by scanning the time-ordered catch-up list and replaying, in publish
//! order, every record newer than its last successful catch-up.
//!
//! Architectural decisions:
//! - The store only offers suffix-wildcard key listing, so the scan pattern is
//!   narrowed with the shared prefix of "last success" and "now"
//! - Records are replayed in ascending timestamp order
//! - A record at exactly the last-success second is never redelivered
//! - Per-key failures are isolated; a missing store handle fails the run
//! - The core reads the last-success marker but never writes it
//!
//! Deterministic logic. All IO goes through the collaborator traits in [`ports`].

mod channel;
mod collect;
mod error;
mod key;
mod order;
mod prefix;
mod publish;
mod reconciler;
mod watermark;

pub mod ports;

pub use channel::{split_channel, ChannelAllowList};
pub use collect::{collect, collect_keys, plan_scan, ScanPlan};
pub use error::{CatchUpError, KeyParseError, MalformedReason, StoreOp};
pub use key::{is_layout_segment, CandidateKey, KeyLayout, RecordTimestamp, KEY_DELIMITER, PATTERN_METACHARS};
pub use order::{order_keys, OrderedKeys};
pub use prefix::{shared_prefix, PrefixMatch};
pub use publish::{CatchUpPublisher, DEFAULT_RECORD_TTL_SECS};
pub use reconciler::{
    advance_marker, CatchUpCounts, CatchUpOutcome, CatchUpReconciler, CatchUpReport, RunPhase,
    SkipReason,
};
pub use watermark::{check_advance, MarkerAdvance};
