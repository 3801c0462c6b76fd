//! Event decoding.
//!
//! Turns raw logs plus their block timestamps into [`ResolvedEvent`]s. A log that
//! does not fit the expected schema is skipped and counted; a log whose indexed
//! address topic carries non-zero padding is rejected and reported as an
//! [`Anomaly`], never parsed into a wrong address.

use alloy::sol_types::SolEvent;
use chrono::NaiveDate;
use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    Address, B256, U256,
    error::Result,
    evm::{
        ERC20, Vault,
        topic::{PaddingError, decode_address},
    },
    vault::{
        daily::utc_date,
        source::{LogBatch, RawEvent},
        timestamps::BlockTimestamps,
    },
};

/// Decoded event type.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::IsVariant)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    /// ERC-20 transfer of the asset; `amount` is the value.
    Transfer,
    /// Vault deposit; `amount` is the asset amount.
    Deposit {
        #[serde_as(as = "DisplayFromStr")]
        shares: U256,
    },
    /// Vault withdrawal; `amount` is the asset amount.
    Withdraw {
        #[serde_as(as = "DisplayFromStr")]
        shares: U256,
    },
    /// Mission completion recorded on chain; `amount` is zero.
    MissionCompleted {
        #[serde_as(as = "DisplayFromStr")]
        mission_id: U256,
    },
}

/// A raw log with its decoded fields and block timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEvent {
    pub raw: RawEvent,
    pub kind: EventKind,
    /// Indexed addresses in topic order (`[from, to]` for transfers, `[user]` otherwise).
    pub participants: Vec<Address>,
    pub amount: U256,
    /// UTC seconds.
    pub timestamp: u64,
}

impl ResolvedEvent {
    /// First indexed participant: the sender of a transfer, the user of a vault event.
    #[inline]
    pub fn sender(&self) -> Option<Address> {
        self.participants.first().copied()
    }

    #[inline]
    pub fn block_number(&self) -> u64 {
        self.raw.block_number
    }

    /// UTC calendar day of the event.
    pub fn date(&self) -> Result<NaiveDate> {
        utc_date(self.timestamp)
    }
}

/// Why a single log could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum DecodeError {
    #[display("unknown event signature {_0:?}")]
    UnknownEvent(Option<B256>),
    #[display("malformed {event} log: {reason}")]
    Malformed { event: &'static str, reason: String },
    #[display("{_0}")]
    Padding(PaddingError),
}

impl std::error::Error for DecodeError {}

impl From<PaddingError> for DecodeError {
    fn from(err: PaddingError) -> Self {
        Self::Padding(err)
    }
}

/// Decodes one log.
pub fn decode(raw: &RawEvent, timestamp: u64) -> Result<ResolvedEvent, DecodeError> {
    let Some(topic0) = raw.topic0() else {
        return Err(DecodeError::UnknownEvent(None));
    };

    let data = raw.log_data();
    let (kind, participants, amount) = match *topic0 {
        ERC20::Transfer::SIGNATURE_HASH => {
            let participants = indexed_addresses(raw, "Transfer", 2)?;
            let event = ERC20::Transfer::decode_log_data(&data).map_err(malformed("Transfer"))?;
            (EventKind::Transfer, participants, event.value)
        }
        Vault::Deposit::SIGNATURE_HASH => {
            let participants = indexed_addresses(raw, "Deposit", 1)?;
            let event = Vault::Deposit::decode_log_data(&data).map_err(malformed("Deposit"))?;
            let kind = EventKind::Deposit {
                shares: event.shares,
            };
            (kind, participants, event.assets)
        }
        Vault::Withdraw::SIGNATURE_HASH => {
            let participants = indexed_addresses(raw, "Withdraw", 1)?;
            let event = Vault::Withdraw::decode_log_data(&data).map_err(malformed("Withdraw"))?;
            let kind = EventKind::Withdraw {
                shares: event.shares,
            };
            (kind, participants, event.assets)
        }
        Vault::MissionCompleted::SIGNATURE_HASH => {
            let participants = indexed_addresses(raw, "MissionCompleted", 1)?;
            let event = Vault::MissionCompleted::decode_log_data(&data)
                .map_err(malformed("MissionCompleted"))?;
            let kind = EventKind::MissionCompleted {
                mission_id: event.missionId,
            };
            (kind, participants, U256::ZERO)
        }
        other => return Err(DecodeError::UnknownEvent(Some(other))),
    };

    Ok(ResolvedEvent {
        raw: raw.clone(),
        kind,
        participants,
        amount,
        timestamp,
    })
}

fn malformed(event: &'static str) -> impl Fn(alloy::sol_types::Error) -> DecodeError {
    move |err| DecodeError::Malformed {
        event,
        reason: err.to_string(),
    }
}

/// Decodes the first `count` indexed topics as addresses.
///
/// The full topic count is checked by the `sol!` decoder afterwards.
fn indexed_addresses(
    raw: &RawEvent,
    event: &'static str,
    count: usize,
) -> Result<Vec<Address>, DecodeError> {
    let Some(words) = raw.topics.get(1..=count) else {
        return Err(DecodeError::Malformed {
            event,
            reason: format!("expected {} topics, got {}", count + 1, raw.topics.len()),
        });
    };
    words
        .iter()
        .map(|word| decode_address(word).map_err(DecodeError::from))
        .collect()
}

/// A log rejected because of a non-standard address encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub reason: String,
}

/// Outcome of decoding a batch of logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    pub events: Vec<ResolvedEvent>,
    /// Logs skipped because they are pending or do not match any known schema.
    pub skipped: usize,
    pub anomalies: Vec<Anomaly>,
}

/// Decodes every log of `raws`, in order.
///
/// Only a missing timestamp is fatal; decoding problems are per log.
pub fn decode_all<'a>(
    raws: impl IntoIterator<Item = &'a RawEvent>,
    timestamps: &BlockTimestamps,
) -> Result<Decoded> {
    let mut decoded = Decoded::default();
    for raw in raws {
        let timestamp = timestamps.get(raw.block_number)?;
        match decode(raw, timestamp) {
            Ok(event) => decoded.events.push(event),
            Err(DecodeError::Padding(err)) => {
                log::error!(
                    "anomalous log in tx {} (block {}): {err}",
                    raw.transaction_hash,
                    raw.block_number
                );
                decoded.anomalies.push(Anomaly {
                    transaction_hash: raw.transaction_hash,
                    block_number: raw.block_number,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                log::warn!(
                    "skipping log in tx {} (block {}): {err}",
                    raw.transaction_hash,
                    raw.block_number
                );
                decoded.skipped += 1;
            }
        }
    }
    Ok(decoded)
}

/// Decodes a scanned batch; its pending logs count as skipped.
pub fn decode_batch(batch: &LogBatch, timestamps: &BlockTimestamps) -> Result<Decoded> {
    let mut decoded = decode_all(&batch.events, timestamps)?;
    decoded.skipped += batch.pending;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Bytes, address};

    use super::*;
    use crate::vault::source::mock;

    const VAULT: Address = address!("0x5c7e4d1a1b2f04a52f9e8e0c3e4b9d07a3c1f6b2");
    const ASSET: Address = address!("0xd077a400968890eacc75cdc901f0356c943e4fdb");
    const ALICE: Address = address!("0x1111111111111111111111111111111111111111");

    #[test]
    fn test_decode_transfer() {
        let raw = mock::transfer(ASSET, ALICE, VAULT, 1_500, 7);
        let event = decode(&raw, 1_700_000_000).unwrap();
        assert_eq!(event.kind, EventKind::Transfer);
        assert_eq!(event.participants, vec![ALICE, VAULT]);
        assert_eq!(event.sender(), Some(ALICE));
        assert_eq!(event.amount, U256::from(1_500));
        assert_eq!(event.block_number(), 7);
        assert_eq!(
            event.date().unwrap(),
            NaiveDate::from_ymd_opt(2023, 11, 14).unwrap()
        );
    }

    #[test]
    fn test_decode_vault_events() {
        let deposit = decode(&mock::deposit(VAULT, ALICE, 10, 1), 0).unwrap();
        assert_eq!(
            deposit.kind,
            EventKind::Deposit {
                shares: U256::from(10)
            }
        );
        assert_eq!(deposit.participants, vec![ALICE]);
        assert_eq!(deposit.amount, U256::from(10));

        let withdraw = decode(&mock::withdraw(VAULT, ALICE, 4, 2), 0).unwrap();
        assert!(withdraw.kind.is_withdraw());
        assert_eq!(withdraw.amount, U256::from(4));

        let mission = decode(&mock::mission(VAULT, ALICE, 3, 3), 0).unwrap();
        assert_eq!(
            mission.kind,
            EventKind::MissionCompleted {
                mission_id: U256::from(3)
            }
        );
        assert_eq!(mission.amount, U256::ZERO);
    }

    #[test]
    fn test_decode_rejects_bad_logs() {
        let mut unknown = mock::transfer(ASSET, ALICE, VAULT, 1, 1);
        unknown.topics[0] = B256::with_last_byte(9);
        assert!(decode(&unknown, 0).unwrap_err().is_unknown_event());

        let mut truncated = mock::transfer(ASSET, ALICE, VAULT, 1, 1);
        truncated.data = Bytes::from_static(&[1, 2, 3]);
        assert!(decode(&truncated, 0).unwrap_err().is_malformed());

        let mut missing_topic = mock::transfer(ASSET, ALICE, VAULT, 1, 1);
        missing_topic.topics.pop();
        assert!(decode(&missing_topic, 0).unwrap_err().is_malformed());

        let mut dirty = mock::transfer(ASSET, ALICE, VAULT, 1, 1);
        dirty.topics[1].0[0] = 0xff;
        assert!(decode(&dirty, 0).unwrap_err().is_padding());
    }

    #[tokio::test]
    async fn test_decode_all_counts_failures() {
        let good = mock::transfer(ASSET, ALICE, VAULT, 5, 1);
        let mut bad = mock::transfer(ASSET, ALICE, VAULT, 6, 1);
        bad.data = Bytes::new();
        let mut dirty = mock::transfer(ASSET, ALICE, VAULT, 7, 2);
        dirty.topics[1].0[3] = 1;

        let raws = vec![good.clone(), bad, dirty.clone()];
        let source = mock::MockSource::new(10, raws.clone(), 0);
        let timestamps = crate::vault::timestamps::resolve(&source, &raws, 4)
            .await
            .unwrap();

        let decoded = decode_all(&raws, &timestamps).unwrap();
        assert_eq!(decoded.events.len(), 1);
        assert_eq!(decoded.events[0].raw, good);
        assert_eq!(decoded.skipped, 1);
        assert_eq!(decoded.anomalies.len(), 1);
        assert_eq!(decoded.anomalies[0].transaction_hash, dirty.transaction_hash);
    }

    #[tokio::test]
    async fn test_decode_batch_counts_pending() {
        let mut bad = mock::transfer(ASSET, ALICE, VAULT, 6, 1);
        bad.data = Bytes::new();
        let batch = LogBatch {
            events: vec![mock::transfer(ASSET, ALICE, VAULT, 5, 1), bad],
            pending: 2,
        };
        let source = mock::MockSource::new(10, batch.events.clone(), 0);
        let timestamps = crate::vault::timestamps::resolve(&source, &batch.events, 4)
            .await
            .unwrap();

        let decoded = decode_batch(&batch, &timestamps).unwrap();
        assert_eq!(decoded.events.len(), 1);
        assert_eq!(decoded.skipped, 3);
    }

    #[test]
    fn test_decode_all_requires_timestamps() {
        let raws = vec![mock::transfer(ASSET, ALICE, VAULT, 5, 1)];
        let err = decode_all(&raws, &BlockTimestamps::default()).unwrap_err();
        assert!(err.is_missing_timestamp());
    }
}
