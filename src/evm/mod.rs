//! EVM plumbing shared by the pipeline.
//!
//! This module wraps the pieces of [Alloy](https://alloy.rs) the scanner needs:
//! provider construction, the contract bindings for the asset token and the vault,
//! the indexed-address topic codec and conversions between minor units and
//! display amounts.
//!
//! # Examples
//!
//! ## Create a Provider
//!
//! ```no_run
//! use vaultscan::evm::{self, ProviderTrait};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = evm::connect("https://public-en.node.kaia.io").await?;
//! let block = provider.get_block_number().await?;
//! println!("Current block: {}", block);
//! # Ok(())
//! # }
//! ```
//!
//! ## Unit Conversions
//!
//! ```
//! use vaultscan::evm::{from_units, to_units};
//! use vaultscan::U256;
//! use rust_decimal::dec;
//!
//! let units = to_units(dec!(1.5), 6).unwrap();
//! assert_eq!(units, U256::from(1_500_000u64));
//! assert_eq!(from_units(units, 6).unwrap(), dec!(1.500000));
//! ```

pub mod contracts;
pub mod topic;

use alloy::{network::Ethereum, transports::TransportError};
/// reimport primitives
pub use alloy::{
    primitives::{Address, B256, U256, address},
    providers::{Provider as ProviderTrait, ProviderBuilder},
};
use rust_decimal::Decimal;

pub use contracts::{ERC20, Vault};

use crate::error::{Error, Result};

/// Provider trait accepted by the RPC adapters.
///
/// Implemented by every Alloy provider on an Ethereum-like network.
pub trait Provider: alloy::providers::Provider<Ethereum> + Send + Sync + Clone + 'static {}

/// Dynamic provider type.
///
/// Use this when you need type erasure for providers.
pub type DynProvider = alloy::providers::DynProvider<Ethereum>;

impl<T> Provider for T where T: alloy::providers::Provider<Ethereum> + Send + Sync + Clone + 'static {}

/// Creates a provider for the given RPC URL.
///
/// The transport (HTTP or WebSocket) is picked from the URL scheme.
#[inline(always)]
pub async fn connect(url: &str) -> Result<DynProvider, TransportError> {
    let provider = ProviderBuilder::new().connect(url).await?;
    Ok(DynProvider::new(provider))
}

/// Largest number of asset decimals a display amount can carry.
pub const MAX_DECIMALS: u8 = 28;

/// Largest mantissa of a [`Decimal`] (96 bits).
const MAX_MANTISSA: u128 = (1 << 96) - 1;

/// Checks that amounts with `decimals` fractional digits fit a [`Decimal`].
pub fn check_decimals(decimals: u8) -> Result<u8> {
    if decimals > MAX_DECIMALS {
        return Err(Error::UnsupportedDecimals(decimals));
    }
    Ok(decimals)
}

/// Converts a display amount into the token's minor unit.
///
/// Fails for negative amounts, for amounts with more fractional digits than the
/// token supports and on overflow.
///
/// # Example
///
/// ```
/// use vaultscan::evm::to_units;
/// use vaultscan::U256;
/// use rust_decimal::dec;
///
/// // 1.5 tokens with 18 decimals
/// let units = to_units(dec!(1.5), 18).unwrap();
/// assert_eq!(units, U256::from(1_500_000_000_000_000_000u128));
/// ```
pub fn to_units(amount: Decimal, decimals: u8) -> Result<U256> {
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount(amount));
    }

    let amount = amount.normalize();
    let scale = amount.scale();
    let decimals = u32::from(decimals);
    if scale > decimals {
        return Err(Error::InvalidAmount(amount));
    }

    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let factor = U256::from(10)
        .checked_pow(U256::from(decimals - scale))
        .ok_or(Error::Overflow)?;
    mantissa.checked_mul(factor).ok_or(Error::Overflow)
}

/// Converts an amount in the token's minor unit into a display amount.
///
/// When the amount has more significant digits than a [`Decimal`] holds, the
/// lowest fractional digits are truncated. Only integer parts beyond the
/// [`Decimal`] range are reported as [`Error::Overflow`].
///
/// # Example
///
/// ```
/// use vaultscan::evm::from_units;
/// use vaultscan::U256;
/// use rust_decimal::dec;
///
/// let amount = from_units(U256::from(98996405), 6).unwrap();
/// assert_eq!(amount, dec!(98.996405));
/// ```
pub fn from_units(amount: U256, decimals: u8) -> Result<Decimal> {
    let max = U256::from(MAX_MANTISSA);
    let ten = U256::from(10);
    let mut mantissa = amount;
    let mut scale = u32::from(decimals);
    while scale > 0 && (mantissa > max || scale > u32::from(MAX_DECIMALS)) {
        mantissa /= ten;
        scale -= 1;
    }

    let mantissa = u128::try_from(mantissa).map_err(|_| Error::Overflow)?;
    let mantissa = i128::try_from(mantissa).map_err(|_| Error::Overflow)?;
    Decimal::try_from_i128_with_scale(mantissa, scale).map_err(|_| Error::Overflow)
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    #[test]
    fn test_from_units() {
        let test_values = [
            (
                U256::from(72305406316320073300i128),
                18,
                dec!(72.305406316320073300),
            ),
            (U256::from(98996405), 6, dec!(98.996405)),
            (U256::ZERO, 6, dec!(0)),
        ];
        for (index, (got, decimals, expect)) in test_values.into_iter().enumerate() {
            assert_eq!(from_units(got, decimals).unwrap(), expect, "failed at {index}");
        }
    }

    #[test]
    fn test_from_units_overflow() {
        assert!(from_units(U256::MAX, 18).unwrap_err().is_overflow());
        assert!(from_units(U256::from(MAX_MANTISSA) + U256::from(1), 0).unwrap_err().is_overflow());
    }

    #[test]
    fn test_from_units_large_amounts() {
        // 1e11 tokens at 18 decimals, 29 significant digits
        let units = U256::from(10).pow(U256::from(29));
        assert_eq!(from_units(units, 18).unwrap(), dec!(100000000000));

        let units = U256::from(123_456_789_012_345_678_901_234_567_891u128);
        assert_eq!(
            from_units(units, 18).unwrap(),
            dec!(123456789012.34567890123456789)
        );

        // more decimals than a Decimal carries
        assert_eq!(from_units(U256::from(5), 30).unwrap(), dec!(0));
        assert_eq!(
            from_units(U256::from(5) * U256::from(10).pow(U256::from(30)), 30).unwrap(),
            dec!(5)
        );
    }

    #[test]
    fn test_check_decimals() {
        assert_eq!(check_decimals(18).unwrap(), 18);
        assert_eq!(check_decimals(MAX_DECIMALS).unwrap(), MAX_DECIMALS);
        assert!(matches!(check_decimals(30), Err(Error::UnsupportedDecimals(30))));
    }

    #[test]
    fn test_to_units() {
        let test_values = [
            (
                dec!(72.305406316320073386),
                18,
                U256::from(72305406316320073386i128),
            ),
            (dec!(98.996405), 6, U256::from(98996405)),
            (dec!(69), 6, U256::from(69000000)),
            (dec!(10.500), 2, U256::from(1050)),
        ];
        for (index, (got, decimals, expect)) in test_values.into_iter().enumerate() {
            assert_eq!(to_units(got, decimals).unwrap(), expect, "failed at {index}");
        }
    }

    #[test]
    fn test_to_units_rejects() {
        assert!(to_units(dec!(-1), 6).unwrap_err().is_invalid_amount());
        // more precision than the token has
        assert!(to_units(dec!(0.1234567), 6).unwrap_err().is_invalid_amount());
    }
}
