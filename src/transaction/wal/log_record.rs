use crate::common::{BlockId, TxnId};
use crate::storage::page::{INT_SIZE, Page, PageError};
use crate::transaction::Transaction;
use crate::transaction::wal::recovery::{RecoveryError, Result};

const CHECKPOINT: i64 = 0;
const START: i64 = 1;
const COMMIT: i64 = 2;
const ROLLBACK: i64 = 3;
const SET_INT: i64 = 4;
const SET_STRING: i64 = 5;

/// A decoded write-ahead log record.
///
/// Records are serialized into a transient page: the opcode as an integer
/// at offset 0, then the variant's fields in declaration order, strings
/// length-prefixed. The set variants carry both images so they can be
/// played in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Checkpoint,
    Start {
        txn: TxnId,
    },
    Commit {
        txn: TxnId,
    },
    Rollback {
        txn: TxnId,
    },
    SetInt {
        txn: TxnId,
        blk: BlockId,
        offset: usize,
        old_val: i64,
        new_val: i64,
    },
    SetString {
        txn: TxnId,
        blk: BlockId,
        offset: usize,
        old_val: String,
        new_val: String,
    },
}

impl LogRecord {
    /// Reconstruct a record from its serialized bytes. An opcode outside
    /// the known set is a decode error; recovery must not guess at the
    /// semantics of a record it does not understand.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let page = Page::from_bytes(bytes.to_vec());
        let tpos = INT_SIZE;
        match page.get_int(0)? {
            CHECKPOINT => Ok(LogRecord::Checkpoint),
            START => Ok(LogRecord::Start {
                txn: page.get_int(tpos)?,
            }),
            COMMIT => Ok(LogRecord::Commit {
                txn: page.get_int(tpos)?,
            }),
            ROLLBACK => Ok(LogRecord::Rollback {
                txn: page.get_int(tpos)?,
            }),
            SET_INT => {
                let txn = page.get_int(tpos)?;
                let fpos = tpos + INT_SIZE;
                let filename = page.get_string(fpos)?;
                let bpos = fpos + Page::max_length(filename.len());
                let blknum = page.get_int(bpos)?;
                let opos = bpos + INT_SIZE;
                let offset = page.get_int(opos)? as usize;
                let old_val = page.get_int(opos + INT_SIZE)?;
                let new_val = page.get_int(opos + 2 * INT_SIZE)?;
                Ok(LogRecord::SetInt {
                    txn,
                    blk: BlockId::new(filename, blknum),
                    offset,
                    old_val,
                    new_val,
                })
            }
            SET_STRING => {
                let txn = page.get_int(tpos)?;
                let fpos = tpos + INT_SIZE;
                let filename = page.get_string(fpos)?;
                let bpos = fpos + Page::max_length(filename.len());
                let blknum = page.get_int(bpos)?;
                let opos = bpos + INT_SIZE;
                let offset = page.get_int(opos)? as usize;
                let oldpos = opos + INT_SIZE;
                let old_val = page.get_string(oldpos)?;
                let newpos = oldpos + Page::max_length(old_val.len());
                let new_val = page.get_string(newpos)?;
                Ok(LogRecord::SetString {
                    txn,
                    blk: BlockId::new(filename, blknum),
                    offset,
                    old_val,
                    new_val,
                })
            }
            op => Err(RecoveryError::UnknownOpcode(op)),
        }
    }

    /// Serialize this record for appending to the log.
    pub fn encode(&self) -> std::result::Result<Vec<u8>, PageError> {
        let tpos = INT_SIZE;
        match self {
            LogRecord::Checkpoint => {
                let mut page = Page::new(INT_SIZE);
                page.set_int(0, CHECKPOINT)?;
                Ok(page.into_bytes())
            }
            LogRecord::Start { txn } => Self::encode_txn_only(START, *txn),
            LogRecord::Commit { txn } => Self::encode_txn_only(COMMIT, *txn),
            LogRecord::Rollback { txn } => Self::encode_txn_only(ROLLBACK, *txn),
            LogRecord::SetInt {
                txn,
                blk,
                offset,
                old_val,
                new_val,
            } => {
                let fpos = tpos + INT_SIZE;
                let bpos = fpos + Page::max_length(blk.filename().len());
                let opos = bpos + INT_SIZE;
                let mut page = Page::new(opos + 3 * INT_SIZE);
                page.set_int(0, SET_INT)?;
                page.set_int(tpos, *txn)?;
                page.set_string(fpos, blk.filename())?;
                page.set_int(bpos, blk.number())?;
                page.set_int(opos, *offset as i64)?;
                page.set_int(opos + INT_SIZE, *old_val)?;
                page.set_int(opos + 2 * INT_SIZE, *new_val)?;
                Ok(page.into_bytes())
            }
            LogRecord::SetString {
                txn,
                blk,
                offset,
                old_val,
                new_val,
            } => {
                let fpos = tpos + INT_SIZE;
                let bpos = fpos + Page::max_length(blk.filename().len());
                let opos = bpos + INT_SIZE;
                let oldpos = opos + INT_SIZE;
                let newpos = oldpos + Page::max_length(old_val.len());
                let mut page = Page::new(newpos + Page::max_length(new_val.len()));
                page.set_int(0, SET_STRING)?;
                page.set_int(tpos, *txn)?;
                page.set_string(fpos, blk.filename())?;
                page.set_int(bpos, blk.number())?;
                page.set_int(opos, *offset as i64)?;
                page.set_string(oldpos, old_val)?;
                page.set_string(newpos, new_val)?;
                Ok(page.into_bytes())
            }
        }
    }

    /// The transaction this record belongs to, if any.
    pub fn txn(&self) -> Option<TxnId> {
        match self {
            LogRecord::Checkpoint => None,
            LogRecord::Start { txn }
            | LogRecord::Commit { txn }
            | LogRecord::Rollback { txn }
            | LogRecord::SetInt { txn, .. }
            | LogRecord::SetString { txn, .. } => Some(*txn),
        }
    }

    /// Reverse this record's effect through `tx`. The replay write is
    /// unlogged; it restores history rather than creating it.
    pub(crate) fn undo(&self, tx: &mut Transaction) -> Result<()> {
        match self {
            LogRecord::SetInt {
                blk,
                offset,
                old_val,
                ..
            } => Self::replay(tx, blk, |tx| tx.apply_int(blk, *offset, *old_val)),
            LogRecord::SetString {
                blk,
                offset,
                old_val,
                ..
            } => Self::replay(tx, blk, |tx| tx.apply_string(blk, *offset, old_val)),
            _ => Ok(()),
        }
    }

    /// Reapply this record's effect through `tx`. Writing a value the
    /// page already holds is a harmless overwrite, so replaying redo
    /// after an interrupted recovery is safe.
    pub(crate) fn redo(&self, tx: &mut Transaction) -> Result<()> {
        match self {
            LogRecord::SetInt {
                blk,
                offset,
                new_val,
                ..
            } => Self::replay(tx, blk, |tx| tx.apply_int(blk, *offset, *new_val)),
            LogRecord::SetString {
                blk,
                offset,
                new_val,
                ..
            } => Self::replay(tx, blk, |tx| tx.apply_string(blk, *offset, new_val)),
            _ => Ok(()),
        }
    }

    fn replay(
        tx: &mut Transaction,
        blk: &BlockId,
        write: impl FnOnce(&mut Transaction) -> Result<()>,
    ) -> Result<()> {
        tx.pin(blk)?;
        let result = write(&mut *tx);
        tx.unpin(blk);
        result
    }

    fn encode_txn_only(op: i64, txn: TxnId) -> std::result::Result<Vec<u8>, PageError> {
        let mut page = Page::new(2 * INT_SIZE);
        page.set_int(0, op)?;
        page.set_int(INT_SIZE, txn)?;
        Ok(page.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_int_round_trip() {
        let rec = LogRecord::SetInt {
            txn: 7,
            blk: BlockId::new("segment", 3),
            offset: 80,
            old_val: -4,
            new_val: 99,
        };
        let bytes = rec.encode().unwrap();
        assert_eq!(LogRecord::decode(&bytes).unwrap(), rec);
    }

    #[test]
    fn set_string_round_trip() {
        let rec = LogRecord::SetString {
            txn: 12,
            blk: BlockId::new("segment", 0),
            offset: 40,
            old_val: "before".to_string(),
            new_val: "a longer after image".to_string(),
        };
        let bytes = rec.encode().unwrap();
        assert_eq!(LogRecord::decode(&bytes).unwrap(), rec);
    }

    #[test]
    fn marker_records_round_trip() {
        for rec in [
            LogRecord::Checkpoint,
            LogRecord::Start { txn: 1 },
            LogRecord::Commit { txn: 2 },
            LogRecord::Rollback { txn: 3 },
        ] {
            let bytes = rec.encode().unwrap();
            assert_eq!(LogRecord::decode(&bytes).unwrap(), rec);
        }
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let mut page = Page::new(INT_SIZE);
        page.set_int(0, 42).unwrap();
        assert!(matches!(
            LogRecord::decode(page.as_slice()),
            Err(RecoveryError::UnknownOpcode(42))
        ));
    }
}
