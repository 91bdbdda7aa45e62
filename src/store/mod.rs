//! Append-only evaluation history on a fjall keyspace.

use anyhow::{Context, Result};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::evaluation::EvaluationRecord;

static APPEND_SEQ: AtomicU32 = AtomicU32::new(0);

/// Records are keyed by timestamp (big-endian nanoseconds) plus an append
/// sequence, so iteration order is chronological and same-instant appends
/// from concurrent evaluations cannot collide.
pub struct EvaluationLog {
    _keyspace: Keyspace,
    partition: PartitionHandle,
}

impl EvaluationLog {
    pub fn open(path: &Path) -> Result<Self> {
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open evaluation log at {}", path.display()))?;
        let partition = keyspace
            .open_partition("evaluations", PartitionCreateOptions::default())
            .context("Failed to open evaluations partition")?;

        Ok(EvaluationLog {
            _keyspace: keyspace,
            partition,
        })
    }

    pub fn append(&self, record: &EvaluationRecord) -> Result<()> {
        let nanos = record.timestamp.timestamp_nanos_opt().unwrap_or_default();
        let seq = APPEND_SEQ.fetch_add(1, Ordering::Relaxed);

        let mut key = [0u8; 12];
        key[..8].copy_from_slice(&nanos.to_be_bytes());
        key[8..].copy_from_slice(&seq.to_be_bytes());

        let value = serde_json::to_vec(record).context("Failed to serialize evaluation record")?;
        self.partition
            .insert(key, value)
            .context("Failed to append evaluation record")?;
        Ok(())
    }

    pub fn list_all(&self) -> Result<Vec<EvaluationRecord>> {
        let mut records = Vec::new();
        for kv in self.partition.iter() {
            let (_key, value) = kv.context("Failed to read evaluation record")?;
            records.push(
                serde_json::from_slice(&value)
                    .context("Failed to deserialize evaluation record")?,
            );
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::Label;
    use crate::core::eps::EpsBasis;
    use crate::core::resolve::Provenance;
    use crate::core::valuation::ValuationMode;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn record(symbol: &str, secs: i64) -> EvaluationRecord {
        EvaluationRecord {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            symbol: symbol.to_string(),
            eps: 5.0,
            eps_basis: EpsBasis::TrailingTwelveMonths,
            eps_source: "yahoo-ttm-eps".to_string(),
            growth_pct: 10.0,
            growth_provenance: Provenance::Provider("yahoo-trend-1y".to_string()),
            discount_pct: 4.4,
            discount_provenance: Provenance::Fallback,
            mode: ValuationMode::GrahamMultiplier,
            years: 5,
            intrinsic_value: 142.5,
            buy_below: 114.0,
            price: Some(100.0),
            label: Some(Label::Undervalued),
        }
    }

    #[test]
    fn test_append_and_list_round_trip() {
        let dir = tempdir().unwrap();
        let log = EvaluationLog::open(dir.path()).unwrap();

        let first = record("AAPL", 1_700_000_000);
        log.append(&first).unwrap();

        let records = log.list_all().unwrap();
        assert_eq!(records, vec![first]);
    }

    #[test]
    fn test_list_is_chronological() {
        let dir = tempdir().unwrap();
        let log = EvaluationLog::open(dir.path()).unwrap();

        // Append out of order; iteration must come back sorted by timestamp
        log.append(&record("MSFT", 1_700_000_200)).unwrap();
        log.append(&record("AAPL", 1_700_000_100)).unwrap();
        log.append(&record("GOOG", 1_700_000_300)).unwrap();

        let symbols: Vec<String> = log
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.symbol)
            .collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "GOOG"]);
    }

    #[test]
    fn test_same_instant_appends_do_not_collide() {
        let dir = tempdir().unwrap();
        let log = EvaluationLog::open(dir.path()).unwrap();

        log.append(&record("AAPL", 1_700_000_000)).unwrap();
        log.append(&record("MSFT", 1_700_000_000)).unwrap();

        assert_eq!(log.list_all().unwrap().len(), 2);
    }

    #[test]
    fn test_log_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let log = EvaluationLog::open(dir.path()).unwrap();
            log.append(&record("AAPL", 1_700_000_000)).unwrap();
        }

        let log = EvaluationLog::open(dir.path()).unwrap();
        assert_eq!(log.list_all().unwrap().len(), 1);
    }
}
