//! Crate error type.

use alloy::{providers::MulticallError, transports::TransportError};

/// Boxed error coming from the RPC transport or a contract call.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the scan pipeline and the share/asset converter.
///
/// Decoding problems on individual logs are not represented here: those logs are
/// skipped (or reported as anomalies) and never abort a scan.
#[derive(Debug, derive_more::Display, derive_more::IsVariant)]
pub enum Error {
    /// A required configuration value is absent.
    #[display("missing configuration: {_0}")]
    MissingConfig(&'static str),
    /// A configuration value is present but unusable.
    #[display("invalid configuration: {_0}")]
    InvalidConfig(String),
    /// An RPC or contract call failed. The underlying error is kept as the source.
    #[display("rpc request failed: {_0}")]
    Transport(BoxError),
    /// The node has no block with this number (pruned history or inconsistent node).
    #[display("block {_0} not found")]
    MissingBlock(u64),
    /// A log references a block whose timestamp was never resolved.
    #[display("no timestamp resolved for block {_0}")]
    MissingTimestamp(u64),
    /// A block timestamp cannot be represented as a UTC date.
    #[display("timestamp {_0} is out of range")]
    InvalidTimestamp(u64),
    /// Share/asset conversion against a vault with zero shares or zero assets.
    #[display("vault has no liquidity")]
    NoLiquidity,
    /// The asset has more decimals than a display amount can carry.
    #[display("unsupported asset decimals: {_0}")]
    UnsupportedDecimals(u8),
    /// An amount cannot be expressed in the asset's minor unit.
    #[display("invalid amount: {_0}")]
    InvalidAmount(rust_decimal::Decimal),
    /// Integer arithmetic would overflow.
    #[display("arithmetic overflow")]
    Overflow,
}

impl Error {
    /// Wraps any RPC-side failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Self::transport(err)
    }
}

impl From<alloy::contract::Error> for Error {
    fn from(err: alloy::contract::Error) -> Self {
        Self::transport(err)
    }
}

impl From<MulticallError> for Error {
    fn from(err: MulticallError) -> Self {
        Self::transport(err)
    }
}
