//! Commit log records and serialization.
//!
//! Every record uses the envelope:
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (length) | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The CRC covers everything before it.
//!
//! A commit payload is `sequence (8) | op_count (4) | ops...` where each op is
//! `kind (1) | key_len (4) | key | [value_len (4) | value]` and the value part
//! is present only for puts.

use crate::error::{EngineError, EngineResult};
use crate::transaction::{PendingWrite, Transaction};
use crate::types::SequenceNumber;

/// Magic bytes identifying a commit log record.
pub const LOG_MAGIC: [u8; 4] = *b"RSLG";

/// Current commit log format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
const HEADER_SIZE: usize = 11;

const CRC_SIZE: usize = 4;

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// An atomically applied set of writes.
    Commit = 1,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// A decoded commit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommitRecord {
    pub(crate) sequence: SequenceNumber,
    pub(crate) ops: Vec<(Vec<u8>, PendingWrite)>,
}

/// Result of scanning a commit log image.
#[derive(Debug)]
pub(crate) struct LogScan {
    pub(crate) records: Vec<CommitRecord>,
    /// Length of the prefix made of complete, valid records.
    pub(crate) valid_len: usize,
}

fn len_u32(len: usize, what: &str) -> EngineResult<u32> {
    u32::try_from(len).map_err(|_| {
        EngineError::invalid_operation(format!("{what} too large: {len} bytes"))
    })
}

/// Encodes the staged writes of `txn` as a complete commit record.
///
/// # Errors
///
/// Returns `InvalidOperation` if a key, value or the whole payload exceeds
/// `u32::MAX` bytes.
pub(crate) fn encode_commit(sequence: SequenceNumber, txn: &Transaction) -> EngineResult<Vec<u8>> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&sequence.as_u64().to_le_bytes());
    payload.extend_from_slice(&len_u32(txn.write_count(), "write set")?.to_le_bytes());

    for (key, write) in txn.pending_writes() {
        match write {
            PendingWrite::Put { value } => {
                payload.push(OP_PUT);
                payload.extend_from_slice(&len_u32(key.len(), "key")?.to_le_bytes());
                payload.extend_from_slice(key);
                payload.extend_from_slice(&len_u32(value.len(), "value")?.to_le_bytes());
                payload.extend_from_slice(value);
            }
            PendingWrite::Delete => {
                payload.push(OP_DELETE);
                payload.extend_from_slice(&len_u32(key.len(), "key")?.to_le_bytes());
                payload.extend_from_slice(key);
            }
        }
    }

    let len = len_u32(payload.len(), "commit payload")?;
    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    data.push(LogRecordType::Commit.as_byte());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = crc32fast::hash(&data);
    data.extend_from_slice(&crc.to_le_bytes());

    Ok(data)
}

/// Bounds-checked cursor over a payload.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> EngineResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| EngineError::corrupted("truncated commit payload"))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> EngineResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> EngineResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> EngineResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn bytes(&mut self) -> EngineResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }
}

fn decode_commit_payload(payload: &[u8]) -> EngineResult<CommitRecord> {
    let mut cursor = Cursor::new(payload);
    let sequence = SequenceNumber::new(cursor.u64()?);
    let count = cursor.u32()? as usize;

    let mut ops = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let kind = cursor.u8()?;
        let key = cursor.bytes()?;
        let write = match kind {
            OP_PUT => PendingWrite::Put {
                value: cursor.bytes()?,
            },
            OP_DELETE => PendingWrite::Delete,
            other => {
                return Err(EngineError::corrupted(format!(
                    "unknown operation kind {other}"
                )))
            }
        };
        ops.push((key, write));
    }

    if !cursor.is_empty() {
        return Err(EngineError::corrupted("trailing bytes in commit payload"));
    }

    Ok(CommitRecord { sequence, ops })
}

/// Returns `true` if `bytes` holds nothing but zeroes.
///
/// A crash can leave the file extended over blocks that were never written,
/// which read back as zeroes.
fn is_zero_fill(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

/// Scans a full commit log image.
///
/// An incomplete record at the end of `data` is a torn write: scanning stops
/// before it and `valid_len` excludes it. A record is also torn when its
/// damage runs into a zero-filled tail, or when it is the last record and
/// fails its CRC.
///
/// # Errors
///
/// Returns `Corrupted` for bad magic, unknown version or type, or a CRC
/// mismatch when non-zero data follows the damage, and for a malformed
/// payload.
pub(crate) fn scan(data: &[u8]) -> EngineResult<LogScan> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < HEADER_SIZE {
            break;
        }

        if rest[0..4] != LOG_MAGIC {
            if is_zero_fill(rest) {
                break;
            }
            return Err(EngineError::corrupted(format!(
                "bad record magic at offset {offset}"
            )));
        }
        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version != LOG_VERSION {
            if is_zero_fill(&rest[4..]) {
                break;
            }
            return Err(EngineError::corrupted(format!(
                "unsupported log version {version} at offset {offset}"
            )));
        }
        if LogRecordType::from_byte(rest[6]).is_none() {
            if is_zero_fill(&rest[6..]) {
                break;
            }
            return Err(EngineError::corrupted(format!(
                "unknown record type {} at offset {offset}",
                rest[6]
            )));
        }

        let len = u32::from_le_bytes([rest[7], rest[8], rest[9], rest[10]]) as usize;
        let Some(total) = HEADER_SIZE
            .checked_add(len)
            .and_then(|n| n.checked_add(CRC_SIZE))
        else {
            break;
        };
        if rest.len() < total {
            break;
        }

        let body_end = HEADER_SIZE + len;
        let stored_crc = u32::from_le_bytes([
            rest[body_end],
            rest[body_end + 1],
            rest[body_end + 2],
            rest[body_end + 3],
        ]);
        if crc32fast::hash(&rest[..body_end]) != stored_crc {
            if is_zero_fill(&rest[total..]) {
                break;
            }
            return Err(EngineError::corrupted(format!(
                "checksum mismatch at offset {offset}"
            )));
        }

        records.push(decode_commit_payload(&rest[HEADER_SIZE..body_end])?);
        offset += total;
    }

    Ok(LogScan {
        records,
        valid_len: offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionId;
    use proptest::prelude::*;

    fn sample_txn() -> Transaction {
        let mut txn = Transaction::new(TransactionId::new(1));
        txn.put(b"alpha", b"one".to_vec()).unwrap();
        txn.delete(b"beta").unwrap();
        txn.put(b"gamma", Vec::new()).unwrap();
        txn
    }

    #[test]
    fn commit_record_scans_back() {
        let data = encode_commit(SequenceNumber::new(7), &sample_txn()).unwrap();
        let scan = scan(&data).unwrap();

        assert_eq!(scan.valid_len, data.len());
        assert_eq!(scan.records.len(), 1);
        let record = &scan.records[0];
        assert_eq!(record.sequence, SequenceNumber::new(7));
        assert_eq!(
            record.ops,
            vec![
                (
                    b"alpha".to_vec(),
                    PendingWrite::Put {
                        value: b"one".to_vec()
                    }
                ),
                (b"beta".to_vec(), PendingWrite::Delete),
                (b"gamma".to_vec(), PendingWrite::Put { value: Vec::new() }),
            ]
        );
    }

    #[test]
    fn envelope_layout() {
        let data = encode_commit(SequenceNumber::new(1), &sample_txn()).unwrap();
        assert_eq!(&data[0..4], b"RSLG");
        assert_eq!(u16::from_le_bytes([data[4], data[5]]), LOG_VERSION);
        assert_eq!(data[6], LogRecordType::Commit.as_byte());
        let len = u32::from_le_bytes([data[7], data[8], data[9], data[10]]) as usize;
        assert_eq!(data.len(), HEADER_SIZE + len + CRC_SIZE);
    }

    #[test]
    fn empty_log_scans_to_nothing() {
        let scan = scan(&[]).unwrap();
        assert!(scan.records.is_empty());
        assert_eq!(scan.valid_len, 0);
    }

    #[test]
    fn torn_tail_is_excluded() {
        let first = encode_commit(SequenceNumber::new(1), &sample_txn()).unwrap();
        let second = encode_commit(SequenceNumber::new(2), &sample_txn()).unwrap();

        for cut in [1, HEADER_SIZE, second.len() - 1] {
            let mut data = first.clone();
            data.extend_from_slice(&second[..cut]);

            let scan = scan(&data).unwrap();
            assert_eq!(scan.records.len(), 1, "cut at {cut}");
            assert_eq!(scan.valid_len, first.len(), "cut at {cut}");
        }
    }

    #[test]
    fn bad_crc_on_last_record_is_torn() {
        let mut data = encode_commit(SequenceNumber::new(1), &sample_txn()).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;

        let scan = scan(&data).unwrap();
        assert!(scan.records.is_empty());
        assert_eq!(scan.valid_len, 0);
    }

    #[test]
    fn bad_crc_before_more_data_is_corruption() {
        let mut data = encode_commit(SequenceNumber::new(1), &sample_txn()).unwrap();
        data[HEADER_SIZE] ^= 0xFF;
        data.extend(encode_commit(SequenceNumber::new(2), &sample_txn()).unwrap());

        assert!(matches!(scan(&data), Err(EngineError::Corrupted { .. })));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut data = encode_commit(SequenceNumber::new(1), &sample_txn()).unwrap();
        data[0] = b'X';

        assert!(matches!(scan(&data), Err(EngineError::Corrupted { .. })));
    }

    #[test]
    fn zero_filled_tail_is_torn() {
        let first = encode_commit(SequenceNumber::new(1), &sample_txn()).unwrap();
        let mut data = first.clone();
        data.extend_from_slice(&[0u8; 64]);

        let scan = scan(&data).unwrap();
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.valid_len, first.len());
    }

    #[test]
    fn partially_written_record_before_zeroes_is_torn() {
        let first = encode_commit(SequenceNumber::new(1), &sample_txn()).unwrap();
        let second = encode_commit(SequenceNumber::new(2), &sample_txn()).unwrap();

        for written in [4, 6, 7, HEADER_SIZE + 3] {
            let mut data = first.clone();
            data.extend_from_slice(&second[..written]);
            data.extend_from_slice(&vec![0u8; second.len()]);

            let scan = scan(&data).unwrap();
            assert_eq!(scan.records.len(), 1, "written {written}");
            assert_eq!(scan.valid_len, first.len(), "written {written}");
        }
    }

    #[test]
    fn zeroes_before_more_data_are_corruption() {
        let mut data = vec![0u8; 32];
        data.extend(encode_commit(SequenceNumber::new(1), &sample_txn()).unwrap());

        assert!(matches!(scan(&data), Err(EngineError::Corrupted { .. })));
    }

    #[test]
    fn oversized_length_is_torn() {
        let first = encode_commit(SequenceNumber::new(1), &sample_txn()).unwrap();
        let mut data = first.clone();
        data.extend_from_slice(&LOG_MAGIC);
        data.extend_from_slice(&LOG_VERSION.to_le_bytes());
        data.push(LogRecordType::Commit.as_byte());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(b"partial");

        let scan = scan(&data).unwrap();
        assert_eq!(scan.valid_len, first.len());
    }

    #[test]
    fn record_type_from_byte() {
        assert_eq!(LogRecordType::from_byte(1), Some(LogRecordType::Commit));
        assert_eq!(LogRecordType::from_byte(0), None);
    }

    proptest! {
        #[test]
        fn any_prefix_scans_to_complete_records(
            values in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..6),
            cut_ratio in 0.0f64..=1.0,
        ) {
            let mut data = Vec::new();
            let mut ends = Vec::new();
            for (i, value) in values.iter().enumerate() {
                let mut txn = Transaction::new(TransactionId::new(1));
                txn.put(b"k", value.clone()).unwrap();
                data.extend(encode_commit(SequenceNumber::new(i as u64 + 1), &txn).unwrap());
                ends.push(data.len());
            }

            let cut = (data.len() as f64 * cut_ratio) as usize;
            let scan = scan(&data[..cut]).unwrap();
            let complete = ends.iter().filter(|&&end| end <= cut).count();

            prop_assert_eq!(scan.records.len(), complete);
            prop_assert_eq!(scan.valid_len, if complete == 0 { 0 } else { ends[complete - 1] });
        }
    }
}
