//! Flat-file copies of each fetched batch
//!
//! Every batch lands twice in the data directory: a row-oriented CSV and a
//! columnar `.bin` (one vector per column, bincode-encoded). Nothing in the
//! pipeline reads these files back.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::price_observation::PriceObservation;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Column-major copy of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnarSnapshot {
    /// Unix milliseconds
    pub timestamp: Vec<i64>,
    pub coin_id: Vec<String>,
    pub symbol: Vec<String>,
    pub name: Vec<String>,
    pub current_price_usd: Vec<Option<f64>>,
    pub market_cap_usd: Vec<Option<f64>>,
    pub total_volume_usd: Vec<Option<f64>>,
    pub price_change_24h: Vec<Option<f64>>,
    pub price_change_percentage_24h: Vec<Option<f64>>,
    pub circulating_supply: Vec<Option<f64>>,
    pub total_supply: Vec<Option<f64>>,
    pub ath: Vec<Option<f64>>,
    pub ath_date: Vec<Option<i64>>,
    pub atl: Vec<Option<f64>>,
    pub atl_date: Vec<Option<i64>>,
}

impl ColumnarSnapshot {
    pub fn from_rows(rows: &[PriceObservation]) -> Self {
        let mut snap = Self::default();
        let num = |v: Option<Decimal>| v.and_then(|d| d.to_f64());
        let millis = |v: Option<NaiveDateTime>| v.map(|ts| ts.and_utc().timestamp_millis());

        for row in rows {
            snap.timestamp.push(row.timestamp.and_utc().timestamp_millis());
            snap.coin_id.push(row.coin_id.clone());
            snap.symbol.push(row.symbol.clone());
            snap.name.push(row.name.clone());
            snap.current_price_usd.push(num(row.current_price_usd));
            snap.market_cap_usd.push(num(row.market_cap_usd));
            snap.total_volume_usd.push(num(row.total_volume_usd));
            snap.price_change_24h.push(num(row.price_change_24h));
            snap.price_change_percentage_24h.push(num(row.price_change_percentage_24h));
            snap.circulating_supply.push(num(row.circulating_supply));
            snap.total_supply.push(num(row.total_supply));
            snap.ath.push(num(row.ath));
            snap.ath_date.push(millis(row.ath_date));
            snap.atl.push(num(row.atl));
            snap.atl_date.push(millis(row.atl_date));
        }

        snap
    }

    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub csv: PathBuf,
    pub bin: PathBuf,
}

pub fn snapshot_stamp(now: NaiveDateTime) -> String {
    now.format(STAMP_FORMAT).to_string()
}

/// `crypto_{stamp}`, used by the collector
pub fn collector_stem(now: NaiveDateTime) -> String {
    format!("crypto_{}", snapshot_stamp(now))
}

/// `{coin}_historical_{days}days_{stamp}`, used by the backfill
pub fn history_stem(coin_id: &str, days: u32, now: NaiveDateTime) -> String {
    format!("{}_historical_{}days_{}", coin_id, days, snapshot_stamp(now))
}

/// Serialize any rows to CSV with a header line
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `{stem}.csv` and `{stem}.bin` under `dir`, creating it if needed
pub fn write_observation_snapshots(
    dir: &Path,
    stem: &str,
    rows: &[PriceObservation],
) -> Result<SnapshotPaths> {
    std::fs::create_dir_all(dir)?;

    let csv = dir.join(format!("{}.csv", stem));
    write_csv(&csv, rows)?;

    let bin = dir.join(format!("{}.bin", stem));
    let data = bincode::serialize(&ColumnarSnapshot::from_rows(rows))?;
    std::fs::write(&bin, data)?;

    tracing::info!("Data saved to {} and {}", csv.display(), bin.display());

    Ok(SnapshotPaths { csv, bin })
}

/// Number of CSV files in `dir`; a missing directory counts as empty
pub fn count_data_files(dir: &Path) -> Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut count = 0;
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 4)
            .unwrap()
            .and_hms_opt(hour, 15, 30)
            .unwrap()
    }

    fn rows() -> Vec<PriceObservation> {
        let mut btc = PriceObservation::new(at(8), "bitcoin", "btc", "Bitcoin");
        btc.current_price_usd = Some(Decimal::from_str("108950.5").unwrap());
        btc.ath_date = Some(at(1));
        let ada = PriceObservation::new(at(8), "cardano", "ada", "Cardano");
        vec![btc, ada]
    }

    #[test]
    fn test_stems() {
        assert_eq!(collector_stem(at(8)), "crypto_20250704_081530");
        assert_eq!(
            history_stem("bitcoin", 30, at(23)),
            "bitcoin_historical_30days_20250704_231530"
        );
    }

    #[test]
    fn test_write_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("crypto_data");

        let paths = write_observation_snapshots(&data_dir, "crypto_test", &rows()).unwrap();
        assert!(paths.csv.ends_with("crypto_test.csv"));

        let text = std::fs::read_to_string(&paths.csv).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("timestamp,coin_id,symbol,name,current_price_usd"));
        assert!(header.ends_with("atl,atl_date"));
        let btc_line = lines.next().unwrap();
        assert!(btc_line.starts_with("2025-07-04T08:15:30,bitcoin,btc,Bitcoin,108950.5,"));
        let ada_line = lines.next().unwrap();
        assert!(ada_line.ends_with(",,,,,,,,,,,"));

        let bytes = std::fs::read(&paths.bin).unwrap();
        let snap: ColumnarSnapshot = bincode::deserialize(&bytes).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.coin_id, vec!["bitcoin", "cardano"]);
        assert_eq!(snap.current_price_usd, vec![Some(108_950.5), None]);
        assert_eq!(snap.ath_date[0], Some(at(1).and_utc().timestamp_millis()));

        assert_eq!(count_data_files(&data_dir).unwrap(), 1);
    }

    #[test]
    fn test_count_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(count_data_files(&dir.path().join("absent")).unwrap(), 0);
    }
}
