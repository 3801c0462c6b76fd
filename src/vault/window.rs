//! Trailing seven-day metrics.

use std::collections::BTreeSet;

use crate::{
    Address, U256,
    error::{Error, Result},
    vault::events::ResolvedEvent,
};

/// Length of the trailing window in seconds.
pub const WINDOW_SECONDS: u64 = 7 * 86_400;

/// Volume and distinct depositors of the trailing window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowMetrics {
    /// Events at or after this timestamp are inside the window.
    pub boundary: u64,
    pub volume: U256,
    /// Number of inflow events inside the window.
    pub events: usize,
    pub depositors: BTreeSet<Address>,
}

impl WindowMetrics {
    #[inline]
    pub fn unique_depositors(&self) -> usize {
        self.depositors.len()
    }
}

/// Sums inflows with `timestamp >= now - 7 days` and collects their senders.
///
/// Senders are the decoded `from` topics; events with a non-standard address
/// encoding never reach this point (see [`decode`](crate::vault::events::decode)).
pub fn window_metrics(inflow: &[ResolvedEvent], now: u64) -> Result<WindowMetrics> {
    let boundary = now.saturating_sub(WINDOW_SECONDS);
    let mut metrics = WindowMetrics {
        boundary,
        ..Default::default()
    };

    for event in inflow.iter().filter(|event| event.timestamp >= boundary) {
        metrics.volume = metrics
            .volume
            .checked_add(event.amount)
            .ok_or(Error::Overflow)?;
        metrics.events += 1;
        if let Some(sender) = event.sender() {
            metrics.depositors.insert(sender);
        }
    }

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::vault::daily::tests::{D1, DAY, flow};

    const ALICE: Address = address!("0x1111111111111111111111111111111111111111");
    const BOB: Address = address!("0x2222222222222222222222222222222222222222");
    const CAROL: Address = address!("0x3333333333333333333333333333333333333333");

    #[test]
    fn test_window_boundary_is_inclusive() {
        let now = D1 + 10 * DAY;
        let boundary = now - WINDOW_SECONDS;
        let inflow = vec![
            flow(ALICE, 1_000, boundary - 1),
            flow(BOB, 10, boundary),
            flow(ALICE, 20, now),
            flow(BOB, 5, now - DAY),
        ];

        let metrics = window_metrics(&inflow, now).unwrap();
        assert_eq!(metrics.boundary, boundary);
        assert_eq!(metrics.volume, U256::from(35));
        assert_eq!(metrics.events, 3);
        assert_eq!(metrics.unique_depositors(), 2);
        assert!(metrics.depositors.contains(&ALICE));
        assert!(metrics.depositors.contains(&BOB));
    }

    #[test]
    fn test_depositors_bounded_by_events() {
        let now = D1 + 30 * DAY;
        let senders = [ALICE, BOB, CAROL];
        let inflow: Vec<_> = (0..40u64)
            .map(|i| flow(senders[(i % 3) as usize], i, D1 + i * DAY))
            .collect();

        let metrics = window_metrics(&inflow, now).unwrap();
        let inside: Vec<_> = inflow
            .iter()
            .filter(|event| event.timestamp >= now - WINDOW_SECONDS)
            .collect();
        let distinct: BTreeSet<_> = inside.iter().filter_map(|event| event.sender()).collect();

        assert_eq!(metrics.events, inside.len());
        assert!(metrics.unique_depositors() <= metrics.events);
        assert_eq!(metrics.depositors, distinct);
    }

    #[test]
    fn test_empty_window() {
        let metrics = window_metrics(&[flow(ALICE, 10, D1)], D1 + 30 * DAY).unwrap();
        assert_eq!(metrics.volume, U256::ZERO);
        assert_eq!(metrics.unique_depositors(), 0);
    }
}
