//! Analytics summary.
//!
//! The summary is a pure function of the scanned logs and the reference time, so
//! two runs over the same chain state serialize to the same bytes.

use alloy::primitives::I256;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    U256,
    error::Result,
    evm::from_units,
    vault::{
        daily::{self, DayRow},
        events::{Anomaly, Decoded},
        window::window_metrics,
    },
};

/// Flow analytics of a vault over the scanned range.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    /// Reference time of the 7-day window (UTC seconds).
    pub as_of: u64,
    pub from_block: u64,
    pub to_block: u64,
    /// Asset decimals of every amount below.
    pub decimals: u8,
    /// Net-flow TVL: every inflow minus every outflow in the range.
    #[serde_as(as = "DisplayFromStr")]
    pub tvl: I256,
    #[serde_as(as = "DisplayFromStr")]
    pub volume_7d: U256,
    pub unique_depositors_7d: usize,
    /// Sum of decoded inflows; excludes [`anomalies`](Self::anomalies).
    #[serde_as(as = "DisplayFromStr")]
    pub total_inflow: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub total_outflow: U256,
    pub days: Vec<DayRow>,
    /// Logs skipped because they could not be decoded.
    pub skipped: usize,
    /// Logs rejected for a non-standard address encoding.
    ///
    /// These logs matched the vault's flow queries on the node, but their amounts
    /// are left out of `days`, `tvl`, `volume_7d`, `total_inflow` and
    /// `total_outflow`.
    pub anomalies: Vec<Anomaly>,
}

impl AnalyticsSummary {
    /// TVL in display units.
    pub fn tvl_display(&self) -> Result<Decimal> {
        let (sign, abs) = self.tvl.into_sign_and_abs();
        let tvl = from_units(abs, self.decimals)?;
        Ok(if sign.is_negative() { -tvl } else { tvl })
    }

    /// 7-day volume in display units.
    pub fn volume_7d_display(&self) -> Result<Decimal> {
        from_units(self.volume_7d, self.decimals)
    }
}

/// Inputs of [`summarize`].
#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'a> {
    pub inflow: &'a Decoded,
    pub outflow: &'a Decoded,
    pub from_block: u64,
    pub to_block: u64,
    pub decimals: u8,
    pub now: u64,
}

/// Fans the decoded flows out to the daily aggregator and the window metrics.
pub fn summarize(input: SummaryInput<'_>) -> Result<AnalyticsSummary> {
    let flows = daily::aggregate(&input.inflow.events, &input.outflow.events)?;
    let window = window_metrics(&input.inflow.events, input.now)?;

    let mut anomalies = input.inflow.anomalies.clone();
    anomalies.extend(input.outflow.anomalies.iter().cloned());

    Ok(AnalyticsSummary {
        as_of: input.now,
        from_block: input.from_block,
        to_block: input.to_block,
        decimals: input.decimals,
        tvl: flows.tvl,
        volume_7d: window.volume,
        unique_depositors_7d: window.unique_depositors(),
        total_inflow: flows.total_inflow,
        total_outflow: flows.total_outflow,
        days: flows.rows,
        skipped: input.inflow.skipped + input.outflow.skipped,
        anomalies,
    })
}
