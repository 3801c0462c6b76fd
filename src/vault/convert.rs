//! Share/asset conversion.
//!
//! Withdrawals are requested in asset terms but the vault burns shares. The share
//! count for a request is rounded down and then bumped by one unit so that the
//! shares burned are always worth at least the requested assets.

use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    U256,
    error::{Error, Result},
    vault::source::VaultTotals,
};

fn check_liquidity(total_shares: U256, total_assets: U256) -> Result<()> {
    if total_shares.is_zero() || total_assets.is_zero() {
        return Err(Error::NoLiquidity);
    }
    Ok(())
}

/// Shares to burn for `requested` assets: `floor(requested * shares / assets) + 1`.
///
/// A zero request needs zero shares. Fails with [`Error::NoLiquidity`] when either
/// total is zero and with [`Error::Overflow`] instead of wrapping.
///
/// # Example
///
/// ```
/// use vaultscan::{U256, vault::convert::assets_to_shares};
///
/// let shares = assets_to_shares(U256::from(1000), U256::from(500), U256::from(999)).unwrap();
/// assert_eq!(shares, U256::from(501));
/// ```
pub fn assets_to_shares(requested: U256, total_shares: U256, total_assets: U256) -> Result<U256> {
    check_liquidity(total_shares, total_assets)?;
    if requested.is_zero() {
        return Ok(U256::ZERO);
    }

    let scaled = requested.checked_mul(total_shares).ok_or(Error::Overflow)?;
    (scaled / total_assets)
        .checked_add(U256::from(1))
        .ok_or(Error::Overflow)
}

/// Assets worth `shares`: `floor(shares * assets / total_shares)`.
pub fn shares_to_assets(shares: U256, total_shares: U256, total_assets: U256) -> Result<U256> {
    check_liquidity(total_shares, total_assets)?;
    let scaled = shares.checked_mul(total_assets).ok_or(Error::Overflow)?;
    Ok(scaled / total_shares)
}

/// A withdrawal sizing and the totals it was computed from.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionQuote {
    #[serde_as(as = "DisplayFromStr")]
    pub requested_assets: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub implied_shares: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub total_shares: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub total_assets: U256,
}

impl ConversionQuote {
    pub fn new(requested_assets: U256, totals: VaultTotals) -> Result<Self> {
        let implied_shares =
            assets_to_shares(requested_assets, totals.total_shares, totals.total_assets)?;
        Ok(Self {
            requested_assets,
            implied_shares,
            total_shares: totals.total_shares,
            total_assets: totals.total_assets,
        })
    }
}
