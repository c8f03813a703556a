//! Scenario: the publishing path writes records the reconciler can read back
//!
//! # Invariants under test
//!
//! 1. Keys follow `<namespace>:<list-name>:<timestamp>:<model>:<action>:<identifier>`.
//! 2. Payloads are stored as JSON with the configured TTL (default six hours).
//! 3. Bad channels and identifiers are rejected before anything is written.

use anyhow::Result;
use serde_json::json;
use std::cell::RefCell;

use mbus_catchup::ports::{FixedClock, RecordWriter};
use mbus_catchup::{CatchUpPublisher, KeyLayout, RecordTimestamp, DEFAULT_RECORD_TTL_SECS};

#[derive(Default)]
struct Writes(RefCell<Vec<(String, String, u64)>>);

impl RecordWriter for Writes {
    fn put_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.0
            .borrow_mut()
            .push((key.to_string(), value.to_string(), ttl_secs));
        Ok(())
    }
}

fn layout() -> KeyLayout {
    KeyLayout::new("jupiter", "action_list")
}

#[test]
fn record_writes_timestamped_key_with_default_ttl() {
    let writes = Writes::default();
    let publisher =
        CatchUpPublisher::new(layout(), &writes).with_clock(FixedClock::at_secs(1_370_533_530));

    let key = publisher
        .record("person:update", "1", &json!({ "id": 1 }))
        .unwrap();

    assert_eq!(key, "jupiter:action_list:1370533530.000000:person:update:1");
    let w = writes.0.borrow();
    assert_eq!(w.len(), 1);
    assert_eq!(w[0].0, key);
    assert_eq!(w[0].1, r#"{"id":1}"#);
    assert_eq!(w[0].2, DEFAULT_RECORD_TTL_SECS);
    assert_eq!(DEFAULT_RECORD_TTL_SECS, 21_600);
}

#[test]
fn record_at_uses_explicit_timestamp_and_ttl() {
    let writes = Writes::default();
    let publisher = CatchUpPublisher::new(layout(), &writes).with_ttl_secs(60);
    let at = RecordTimestamp::parse("1370533534.67259").unwrap();

    let key = publisher
        .record_at("contact:update", "103", &json!({ "name": "x" }), &at)
        .unwrap();

    assert_eq!(key, "jupiter:action_list:1370533534.67259:contact:update:103");
    assert_eq!(publisher.ttl_secs(), 60);
    assert_eq!(writes.0.borrow()[0].2, 60);
    assert!(layout().parse(&key).is_ok());
}

#[test]
fn invalid_channel_or_identifier_writes_nothing() {
    let writes = Writes::default();
    let publisher = CatchUpPublisher::new(layout(), &writes);
    let at = RecordTimestamp::parse("1").unwrap();

    assert!(publisher.record_at("contact", "1", &json!({}), &at).is_err());
    assert!(publisher.record_at("contact:update:x", "1", &json!({}), &at).is_err());
    assert!(publisher.record_at("contact:update", "", &json!({}), &at).is_err());
    assert!(publisher.record_at("contact:update", "a:b", &json!({}), &at).is_err());
    assert!(publisher
        .with_ttl_secs(0)
        .record_at("contact:update", "1", &json!({}), &at)
        .is_err());
    assert!(writes.0.borrow().is_empty());
}
