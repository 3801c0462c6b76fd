//! Per-user activity, missions and points.
//!
//! Everything here is derived from the vault's own Deposit, Withdraw and
//! MissionCompleted events, filtered down to one address.

use std::collections::BTreeSet;

use rust_decimal::{Decimal, dec, prelude::ToPrimitive};
use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    Address, B256, U256,
    error::{Error, Result},
    evm::{from_units, to_units},
    vault::events::{EventKind, ResolvedEvent},
};

/// Minimum size of a deposit counted towards `steady_saver`, in asset units.
pub const STEADY_SAVER_MIN: Decimal = dec!(10);

/// Number of qualifying deposits needed for `steady_saver`.
pub const STEADY_SAVER_COUNT: usize = 3;

/// Minimum size of a single deposit for `whale`, in asset units.
pub const WHALE_MIN: Decimal = dec!(1000);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display, derive_more::IsVariant,
)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    #[display("deposit")]
    Deposit,
    #[display("withdraw")]
    Withdraw,
}

/// One deposit or withdrawal of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    /// Asset amount in display units.
    pub amount: Decimal,
    pub transaction_hash: B256,
    pub block_number: u64,
    pub timestamp: u64,
}

fn activity_kind(kind: &EventKind) -> Option<ActivityKind> {
    match kind {
        EventKind::Deposit { .. } => Some(ActivityKind::Deposit),
        EventKind::Withdraw { .. } => Some(ActivityKind::Withdraw),
        _ => None,
    }
}

/// Deposits and withdrawals of `user`, newest block first.
///
/// Events of the same block keep their input order.
pub fn extract(user: Address, events: &[ResolvedEvent], decimals: u8) -> Result<Vec<ActivityRecord>> {
    let mut records = events
        .iter()
        .filter(|event| event.sender() == Some(user))
        .filter_map(|event| activity_kind(&event.kind).map(|kind| (kind, event)))
        .map(|(kind, event)| {
            Ok(ActivityRecord {
                kind,
                amount: from_units(event.amount, decimals)?,
                transaction_hash: event.raw.transaction_hash,
                block_number: event.block_number(),
                timestamp: event.timestamp,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // stable: same-block records stay in input order
    records.sort_by(|a, b| b.block_number.cmp(&a.block_number));
    Ok(records)
}

/// Mission flags derived from a user's deposits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionStatus {
    /// At least one deposit.
    pub first_deposit: bool,
    /// At least [`STEADY_SAVER_COUNT`] deposits of [`STEADY_SAVER_MIN`] or more.
    pub steady_saver: bool,
    /// A single deposit of [`WHALE_MIN`] or more.
    pub whale: bool,
}

impl MissionStatus {
    /// Evaluates the missions over raw deposit amounts of an asset with `decimals`.
    ///
    /// Thresholds are scaled to minor units, so no deposit is ever rounded.
    pub fn from_deposits(deposits: &[U256], decimals: u8) -> Result<Self> {
        let steady_min = to_units(STEADY_SAVER_MIN, decimals)?;
        let whale_min = to_units(WHALE_MIN, decimals)?;
        let steady = deposits
            .iter()
            .filter(|amount| **amount >= steady_min)
            .count();
        Ok(Self {
            first_deposit: !deposits.is_empty(),
            steady_saver: steady >= STEADY_SAVER_COUNT,
            whale: deposits.iter().any(|amount| *amount >= whale_min),
        })
    }
}

/// Point weights of each mission plus the per-unit deposit weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionWeights {
    pub first_deposit: Decimal,
    pub steady_saver: Decimal,
    pub whale: Decimal,
    /// Points per deposited asset unit.
    pub per_unit: Decimal,
}

impl Default for MissionWeights {
    fn default() -> Self {
        Self {
            first_deposit: dec!(100),
            steady_saver: dec!(300),
            whale: dec!(500),
            per_unit: dec!(1),
        }
    }
}

impl MissionWeights {
    /// Floored point total.
    pub fn points(&self, missions: &MissionStatus, total_deposited: Decimal) -> Result<u64> {
        let flag = |done: bool, weight: Decimal| if done { weight } else { Decimal::ZERO };
        let points = [
            flag(missions.first_deposit, self.first_deposit),
            flag(missions.steady_saver, self.steady_saver),
            flag(missions.whale, self.whale),
        ]
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .and_then(|sum| {
            self.per_unit
                .checked_mul(total_deposited)
                .and_then(|units| sum.checked_add(units))
        })
        .ok_or(Error::Overflow)?;

        points.floor().to_u64().ok_or(Error::Overflow)
    }
}

/// A user's derived state.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user: Address,
    pub missions: MissionStatus,
    /// Mission ids completed on chain, ascending.
    #[serde_as(as = "Vec<DisplayFromStr>")]
    pub on_chain_missions: Vec<U256>,
    pub deposit_count: usize,
    pub withdraw_count: usize,
    /// Sum of all deposits in display units.
    pub total_deposited: Decimal,
    pub points: u64,
}

/// Builds the profile of `user` from the vault events.
pub fn profile(
    user: Address,
    events: &[ResolvedEvent],
    decimals: u8,
    weights: &MissionWeights,
) -> Result<UserProfile> {
    let mut deposits = vec![];
    let mut withdraw_count = 0;
    let mut on_chain = BTreeSet::new();

    for event in events.iter().filter(|event| event.sender() == Some(user)) {
        match event.kind {
            EventKind::Deposit { .. } => deposits.push(event.amount),
            EventKind::Withdraw { .. } => withdraw_count += 1,
            EventKind::MissionCompleted { mission_id } => {
                on_chain.insert(mission_id);
            }
            EventKind::Transfer => {}
        }
    }

    let total = deposits
        .iter()
        .try_fold(U256::ZERO, |sum, amount| sum.checked_add(*amount))
        .ok_or(Error::Overflow)?;
    let total_deposited = from_units(total, decimals)?;
    let missions = MissionStatus::from_deposits(&deposits, decimals)?;
    let points = weights.points(&missions, total_deposited)?;

    Ok(UserProfile {
        user,
        missions,
        on_chain_missions: on_chain.into_iter().collect(),
        deposit_count: deposits.len(),
        withdraw_count,
        total_deposited,
        points,
    })
}
