//! `PoolCreated` log decoder.
//!
//! # Layout
//! - `topics[0]`: event signature hash (filtered upstream, not re-checked)
//! - `topics[1]`, `topics[2]`: indexed `token0`, `token1` (low 20 bytes)
//! - `data`: one 32-byte ABI word per non-indexed parameter, in declaration
//!   order: `fee` (`uint24`), `tickSpacing` (`int24`), `pool` (`address`)
//!
//! With [`TopicLayout::FeeIndexed`] the `fee` moves to `topics[3]` and `data`
//! holds only `tickSpacing` and `pool`.
//!
//! Decoding is pure: the same bytes always give the same result.

use alloy_primitives::{Address, B256, I256, U256};

use crate::error::DecodeError;
use crate::types::{LogPosition, LogRecord, PoolCreatedEvent, TopicLayout};

const WORD: usize = 32;

const UINT24_MAX: u32 = (1 << 24) - 1;
const INT24_MIN: i32 = -(1 << 23);
const INT24_MAX: i32 = (1 << 23) - 1;

/// Result of decoding a batch of logs where failures are skipped, not fatal.
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub events: Vec<PoolCreatedEvent>,
    pub failures: Vec<(LogPosition, DecodeError)>,
}

/// Stateless decoder for `PoolCreated` logs. Cheap to copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCreatedDecoder {
    layout: TopicLayout,
}

impl PoolCreatedDecoder {
    pub fn new(layout: TopicLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> TopicLayout {
        self.layout
    }

    /// Decode one log.
    pub fn decode(&self, log: &LogRecord) -> Result<PoolCreatedEvent, DecodeError> {
        let arity = self.layout.topic_arity();
        if log.topics.len() < arity {
            return Err(DecodeError::TooFewTopics {
                expected: arity,
                got: log.topics.len(),
            });
        }
        let min_data = self.layout.data_len();
        if log.data.len() < min_data {
            return Err(DecodeError::DataTooShort {
                expected: min_data,
                got: log.data.len(),
            });
        }

        let (fee_word, first_data_word) = match self.layout {
            TopicLayout::FeeInData => (word(&log.data, 0), 1),
            TopicLayout::FeeIndexed => (log.topics[3], 0),
        };

        Ok(PoolCreatedEvent {
            token0: Address::from_word(log.topics[1]),
            token1: Address::from_word(log.topics[2]),
            fee: decode_uint24(fee_word)?,
            tick_spacing: decode_int24(word(&log.data, first_data_word))?,
            pool: Address::from_word(word(&log.data, first_data_word + 1)),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        })
    }

    /// Decode every log, collecting failures instead of stopping at the first one.
    pub fn decode_all<'a, I>(&self, logs: I) -> DecodedBatch
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        let mut batch = DecodedBatch::default();
        for log in logs {
            match self.decode(log) {
                Ok(event) => batch.events.push(event),
                Err(e) => batch.failures.push((log.position(), e)),
            }
        }
        batch
    }
}

/// The `index`-th 32-byte word of `data`. Callers check the length first.
fn word(data: &[u8], index: usize) -> B256 {
    B256::from_slice(&data[index * WORD..(index + 1) * WORD])
}

/// Big-endian unsigned read of the whole word, bounded to `uint24`.
fn decode_uint24(word: B256) -> Result<u32, DecodeError> {
    let value = U256::from_be_bytes(word.0);
    u32::try_from(value)
        .ok()
        .filter(|v| *v <= UINT24_MAX)
        .ok_or(DecodeError::OutOfRange {
            field: "fee",
            ty: "uint24",
        })
}

/// Two's-complement read over all 256 bits (sign bit = bit 255), bounded to `int24`.
fn decode_int24(word: B256) -> Result<i32, DecodeError> {
    let value = I256::from_raw(U256::from_be_bytes(word.0));
    i32::try_from(value)
        .ok()
        .filter(|v| (INT24_MIN..=INT24_MAX).contains(v))
        .ok_or(DecodeError::OutOfRange {
            field: "tickSpacing",
            ty: "int24",
        })
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{keccak256, Bytes};

    use crate::types::POOL_CREATED_SIGNATURE;

    fn padded(addr: Address) -> B256 {
        addr.into_word()
    }

    fn uint_word(v: u64) -> [u8; 32] {
        U256::from(v).to_be_bytes()
    }

    fn int_word(v: i64) -> [u8; 32] {
        I256::try_from(v).unwrap().to_be_bytes()
    }

    fn sample_log(tick_spacing: i64, data_words: usize) -> LogRecord {
        let mut data = Vec::new();
        data.extend_from_slice(&uint_word(3000));
        data.extend_from_slice(&int_word(tick_spacing));
        data.extend_from_slice(padded(Address::repeat_byte(0x33)).as_slice());
        data.truncate(data_words * WORD);
        LogRecord {
            address: Address::repeat_byte(0xfa),
            topics: vec![
                keccak256(POOL_CREATED_SIGNATURE),
                padded(Address::repeat_byte(0x11)),
                padded(Address::repeat_byte(0x22)),
            ],
            data: Bytes::from(data),
            block_number: 7,
            transaction_hash: B256::repeat_byte(0xee),
            log_index: 2,
        }
    }

    #[test]
    fn decodes_all_fields() {
        let event = PoolCreatedDecoder::default()
            .decode(&sample_log(60, 3))
            .unwrap();
        assert_eq!(event.token0, Address::repeat_byte(0x11));
        assert_eq!(event.token1, Address::repeat_byte(0x22));
        assert_eq!(event.fee, 3000);
        assert_eq!(event.tick_spacing, 60);
        assert_eq!(event.pool, Address::repeat_byte(0x33));
        assert_eq!(event.block_number, 7);
        assert_eq!(event.log_index, 2);
        assert_eq!(event.transaction_hash, B256::repeat_byte(0xee));
    }

    #[test]
    fn negative_tick_spacing_is_sign_extended() {
        let log = sample_log(-60, 3);
        // -60 occupies the full word: 0xff..ffc4
        assert_eq!(log.data[32], 0xff);
        assert_eq!(log.data[63], 0xc4);
        let event = PoolCreatedDecoder::default().decode(&log).unwrap();
        assert_eq!(event.tick_spacing, -60);
    }

    #[test]
    fn short_data_is_rejected() {
        let err = PoolCreatedDecoder::default()
            .decode(&sample_log(60, 2))
            .unwrap_err();
        assert_eq!(err, DecodeError::DataTooShort { expected: 96, got: 64 });
    }

    #[test]
    fn missing_topics_are_rejected() {
        let mut log = sample_log(60, 3);
        log.topics.truncate(2);
        let err = PoolCreatedDecoder::default().decode(&log).unwrap_err();
        assert_eq!(err, DecodeError::TooFewTopics { expected: 3, got: 2 });
    }

    #[test]
    fn batch_skips_bad_log() {
        let mut logs = vec![sample_log(60, 3), sample_log(10, 1), sample_log(200, 3)];
        for (i, log) in logs.iter_mut().enumerate() {
            log.log_index = i as u64;
        }
        let batch = PoolCreatedDecoder::default().decode_all(&logs);
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[0].tick_spacing, 60);
        assert_eq!(batch.events[1].tick_spacing, 200);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].0.log_index, 1);
    }

    #[test]
    fn fee_out_of_uint24_range() {
        let mut log = sample_log(60, 3);
        let mut data = log.data.to_vec();
        data[..32].copy_from_slice(&uint_word(1 << 24));
        log.data = Bytes::from(data);
        let err = PoolCreatedDecoder::default().decode(&log).unwrap_err();
        assert_eq!(err, DecodeError::OutOfRange { field: "fee", ty: "uint24" });
    }

    #[test]
    fn tick_spacing_out_of_int24_range() {
        let err = PoolCreatedDecoder::default()
            .decode(&sample_log(-(1 << 23) - 1, 3))
            .unwrap_err();
        assert_eq!(err, DecodeError::OutOfRange { field: "tickSpacing", ty: "int24" });
        let event = PoolCreatedDecoder::default()
            .decode(&sample_log(-(1 << 23), 3))
            .unwrap();
        assert_eq!(event.tick_spacing, INT24_MIN);
    }

    #[test]
    fn indexed_fee_layout() {
        let mut log = sample_log(-10, 3);
        // Drop the fee word from data and move it to topics[3].
        log.data = Bytes::from(log.data[32..].to_vec());
        log.topics.push(B256::from(uint_word(500)));
        let event = PoolCreatedDecoder::new(TopicLayout::FeeIndexed)
            .decode(&log)
            .unwrap();
        assert_eq!(event.fee, 500);
        assert_eq!(event.tick_spacing, -10);
        assert_eq!(event.pool, Address::repeat_byte(0x33));

        let err = PoolCreatedDecoder::new(TopicLayout::FeeInData)
            .decode(&log)
            .unwrap_err();
        assert_eq!(err, DecodeError::DataTooShort { expected: 96, got: 64 });
    }

    #[test]
    fn decoding_is_deterministic() {
        let log = sample_log(-200, 3);
        let decoder = PoolCreatedDecoder::default();
        assert_eq!(decoder.decode(&log), decoder.decode(&log));
    }
}
