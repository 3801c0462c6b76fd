//! Daily flow aggregation.
//!
//! Every inflow and outflow is assigned to the UTC calendar day of its block
//! timestamp. Days are always UTC, never local time, so every reader sees the same
//! boundaries. TVL here is the running sum of net flows, independent of the
//! vault's own `totalAssets()`.

use std::collections::BTreeMap;

use alloy::primitives::I256;
use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    U256,
    error::{Error, Result},
    vault::events::ResolvedEvent,
};

/// UTC calendar day of a timestamp in seconds.
pub fn utc_date(timestamp: u64) -> Result<NaiveDate> {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.date_naive())
        .ok_or(Error::InvalidTimestamp(timestamp))
}

/// Inflow and outflow totals of one UTC day, in the asset's minor unit.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    #[serde_as(as = "DisplayFromStr")]
    pub inflow: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub outflow: U256,
}

impl DayBucket {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            inflow: U256::ZERO,
            outflow: U256::ZERO,
        }
    }

    /// `inflow - outflow`.
    pub fn net(&self) -> Result<I256> {
        signed(self.inflow)?
            .checked_sub(signed(self.outflow)?)
            .ok_or(Error::Overflow)
    }
}

/// A day bucket with its net flow and the TVL at the end of that day.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayRow {
    pub date: NaiveDate,
    #[serde_as(as = "DisplayFromStr")]
    pub inflow: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub outflow: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub net: I256,
    #[serde_as(as = "DisplayFromStr")]
    pub tvl: I256,
}

/// Result of the daily aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyFlows {
    /// Ascending by date, one row per distinct day.
    pub rows: Vec<DayRow>,
    /// Cumulative net flow after the last day.
    pub tvl: I256,
    pub total_inflow: U256,
    pub total_outflow: U256,
}

/// Buckets classified inflow and outflow events by UTC day.
pub fn aggregate(inflow: &[ResolvedEvent], outflow: &[ResolvedEvent]) -> Result<DailyFlows> {
    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    let mut total_inflow = U256::ZERO;
    let mut total_outflow = U256::ZERO;

    for event in inflow {
        let date = event.date()?;
        let bucket = buckets.entry(date).or_insert_with(|| DayBucket::new(date));
        bucket.inflow = bucket
            .inflow
            .checked_add(event.amount)
            .ok_or(Error::Overflow)?;
        total_inflow = total_inflow.checked_add(event.amount).ok_or(Error::Overflow)?;
    }

    for event in outflow {
        let date = event.date()?;
        let bucket = buckets.entry(date).or_insert_with(|| DayBucket::new(date));
        bucket.outflow = bucket
            .outflow
            .checked_add(event.amount)
            .ok_or(Error::Overflow)?;
        total_outflow = total_outflow.checked_add(event.amount).ok_or(Error::Overflow)?;
    }

    // BTreeMap iteration is already ascending by date
    let mut tvl = I256::ZERO;
    let mut rows = Vec::with_capacity(buckets.len());
    for bucket in buckets.into_values() {
        let net = bucket.net()?;
        tvl = tvl.checked_add(net).ok_or(Error::Overflow)?;
        rows.push(DayRow {
            date: bucket.date,
            inflow: bucket.inflow,
            outflow: bucket.outflow,
            net,
            tvl,
        });
    }

    Ok(DailyFlows {
        rows,
        tvl,
        total_inflow,
        total_outflow,
    })
}

fn signed(value: U256) -> Result<I256> {
    I256::try_from(value).map_err(|_| Error::Overflow)
}

#[cfg(test)]
pub(crate) mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::{
        Address,
        vault::{events::EventKind, source::mock},
    };

    const VAULT: Address = address!("0x5c7e4d1a1b2f04a52f9e8e0c3e4b9d07a3c1f6b2");
    const ASSET: Address = address!("0xd077a400968890eacc75cdc901f0356c943e4fdb");
    const ALICE: Address = address!("0x1111111111111111111111111111111111111111");

    /// 2024-03-01T00:00:00Z
    pub const D1: u64 = 1_709_251_200;
    pub const DAY: u64 = 86_400;

    pub fn flow(from: Address, amount: u64, timestamp: u64) -> ResolvedEvent {
        let raw = mock::transfer(ASSET, from, VAULT, amount, timestamp / 12);
        ResolvedEvent {
            raw,
            kind: EventKind::Transfer,
            participants: vec![from, VAULT],
            amount: U256::from(amount),
            timestamp,
        }
    }

    fn date(timestamp: u64) -> NaiveDate {
        utc_date(timestamp).unwrap()
    }

    #[test]
    fn test_utc_date_boundaries() {
        assert_eq!(date(D1), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(date(D1 - 1), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(date(D1 + DAY - 1), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(utc_date(u64::MAX).unwrap_err().is_invalid_timestamp());
    }

    #[test]
    fn test_inflows_only() {
        let inflow = vec![
            flow(ALICE, 100, D1 + 10),
            flow(ALICE, 50, D1 + 3_600),
            flow(ALICE, 30, D1 + DAY + 5),
        ];

        let flows = aggregate(&inflow, &[]).unwrap();
        assert_eq!(flows.rows.len(), 2);
        assert_eq!(flows.rows[0].date, date(D1));
        assert_eq!(flows.rows[0].inflow, U256::from(150));
        assert_eq!(flows.rows[0].outflow, U256::ZERO);
        assert_eq!(flows.rows[1].date, date(D1 + DAY));
        assert_eq!(flows.rows[1].inflow, U256::from(30));
        assert_eq!(flows.rows[1].tvl, I256::try_from(180).unwrap());
        assert_eq!(flows.tvl, I256::try_from(180).unwrap());
    }

    #[test]
    fn test_unordered_input_with_outflows() {
        let inflow = vec![
            flow(ALICE, 30, D1 + 3 * DAY),
            flow(ALICE, 100, D1),
            flow(ALICE, 5, D1 + 3 * DAY + 1),
        ];
        let outflow = vec![flow(VAULT, 60, D1 + DAY), flow(VAULT, 10, D1 + 3 * DAY)];

        let flows = aggregate(&inflow, &outflow).unwrap();
        let dates: Vec<_> = flows.rows.iter().map(|row| row.date).collect();
        assert_eq!(dates, vec![date(D1), date(D1 + DAY), date(D1 + 3 * DAY)]);

        let tvl: Vec<_> = flows.rows.iter().map(|row| row.tvl).collect();
        assert_eq!(
            tvl,
            vec![
                I256::try_from(100).unwrap(),
                I256::try_from(40).unwrap(),
                I256::try_from(65).unwrap()
            ]
        );
        assert_eq!(flows.rows[1].net, I256::try_from(-60).unwrap());
        assert_eq!(flows.total_inflow, U256::from(135));
        assert_eq!(flows.total_outflow, U256::from(70));
    }

    #[test]
    fn test_tvl_equals_total_net_flow() {
        // pseudo-random flows spread over a month
        let mut inflow = vec![];
        let mut outflow = vec![];
        let mut seed = 0x2545_f491_u64;
        for _ in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let amount = (seed >> 33) % 10_000;
            let timestamp = D1 + (seed >> 20) % (30 * DAY);
            if seed % 3 == 0 {
                outflow.push(flow(VAULT, amount, timestamp));
            } else {
                inflow.push(flow(ALICE, amount, timestamp));
            }
        }

        let flows = aggregate(&inflow, &outflow).unwrap();
        for window in flows.rows.windows(2) {
            assert!(window[0].date < window[1].date);
        }
        let expected = I256::try_from(flows.total_inflow).unwrap()
            - I256::try_from(flows.total_outflow).unwrap();
        assert_eq!(flows.tvl, expected);
        assert_eq!(flows.rows.last().unwrap().tvl, expected);
    }

    #[test]
    fn test_outflow_only_is_negative() {
        let flows = aggregate(&[], &[flow(VAULT, 25, D1)]).unwrap();
        assert_eq!(flows.tvl, I256::try_from(-25).unwrap());
    }

    #[test]
    fn test_empty() {
        let flows = aggregate(&[], &[]).unwrap();
        assert!(flows.rows.is_empty());
        assert_eq!(flows.tvl, I256::ZERO);
    }
}
