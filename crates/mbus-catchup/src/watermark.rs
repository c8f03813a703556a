//! Last-success marker monotonicity.
//!
//! # Invariants
//!
//! - **Non-decreasing**: the marker only moves forward or stays put.
//! - **Regression is not written**: a proposed time older than the current
//!   marker is reported and the stored value is left alone.
//! - **Pure, no IO**: marker implementations call [`check_advance`] and decide
//!   whether to persist.

/// Result of proposing a new last-success time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerAdvance {
    /// Marker moved forward (or was set for the first time).
    Advanced { from: Option<i64>, to: i64 },
    /// Proposed time equals the current marker.
    Unchanged,
    /// Proposed time is older than the current marker; nothing was written.
    Regression { current: i64, got: i64 },
}

impl MarkerAdvance {
    /// `true` when the proposed time must be persisted.
    pub fn should_write(&self) -> bool {
        matches!(self, MarkerAdvance::Advanced { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, MarkerAdvance::Regression { .. })
    }
}

pub fn check_advance(current: Option<i64>, proposed: i64) -> MarkerAdvance {
    match current {
        None => MarkerAdvance::Advanced {
            from: None,
            to: proposed,
        },
        Some(cur) if proposed > cur => MarkerAdvance::Advanced {
            from: Some(cur),
            to: proposed,
        },
        Some(cur) if proposed == cur => MarkerAdvance::Unchanged,
        Some(cur) => MarkerAdvance::Regression {
            current: cur,
            got: proposed,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_marker_always_advances() {
        assert_eq!(
            check_advance(None, 5),
            MarkerAdvance::Advanced { from: None, to: 5 }
        );
    }

    #[test]
    fn same_time_is_unchanged() {
        let r = check_advance(Some(5), 5);
        assert_eq!(r, MarkerAdvance::Unchanged);
        assert!(!r.should_write());
        assert!(!r.is_rejected());
    }

    #[test]
    fn older_time_is_rejected() {
        let r = check_advance(Some(10), 9);
        assert_eq!(r, MarkerAdvance::Regression { current: 10, got: 9 });
        assert!(r.is_rejected());
        assert!(!r.should_write());
    }
}
