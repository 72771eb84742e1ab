use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::config::LedgerConfig;
use crate::ledger::{Ledger, LedgerError, LedgerSnapshot, Uid};
use crate::raw::RawFields;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("ledger file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ledger CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("ledger file violates lineage: {0}")]
    Ledger(#[from] LedgerError),
}

pub fn write_json(ledger: &Ledger, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &ledger.snapshot())?;
    Ok(())
}

pub fn read_json(path: impl AsRef<Path>, config: &LedgerConfig) -> Result<Ledger, ExportError> {
    let reader = BufReader::new(File::open(path)?);
    let snapshot: LedgerSnapshot = serde_json::from_reader(reader)?;
    Ok(Ledger::from_snapshot(&snapshot, config)?)
}

#[derive(Serialize)]
struct Row {
    seq_no: u32,
    parent_seq_no: u32,
    uid: String,
    pipeline: u32,
    super_type: u32,
    sub_type: u32,
    mat_surf_id: u32,
}

/// One row per committed entry, ordered by seq_no.
pub fn write_csv<W: Write>(ledger: &Ledger, writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (seq_no, entry) in ledger.snapshot().entries {
        let fields = RawFields::decode(entry.event);
        csv_writer.serialize(Row {
            seq_no,
            parent_seq_no: entry.parent_seq_no,
            uid: Uid::new(seq_no, entry.event).to_string(),
            pipeline: fields.pipeline,
            super_type: fields.super_type,
            sub_type: fields.sub_type,
            mat_surf_id: fields.mat_surf_id,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventType, MatSurfId, StageCode, mcrt_event};
    use tempfile::tempdir;

    fn sample_ledger() -> Ledger {
        let ledger = Ledger::new();
        let laser = EventType::emission(StageCode::default(), MatSurfId::new(0));
        let refraction = EventType::mcrt(mcrt_event!(Interface, Refraction), MatSurfId::new(1));
        ledger.insert(1, 0, laser.encode().unwrap()).unwrap();
        ledger.insert(2, 1, refraction.encode().unwrap()).unwrap();
        ledger
    }

    #[test]
    fn json_round_trip() {
        let ledger = sample_ledger();
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let path = temp_dir.path().join("ledger.json");
        write_json(&ledger, &path).expect("Failed to save ledger to JSON.");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"0x03010001\""));

        let loaded = read_json(&path, &LedgerConfig::default()).unwrap();
        assert_eq!(loaded.snapshot(), ledger.snapshot());
        assert_eq!(loaded.chain(2).unwrap(), ledger.chain(2).unwrap());
    }

    #[test]
    fn orphaned_json_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("orphan.json");
        std::fs::write(&path, r#"{ "entries": { "4": { "parent_seq_no": 3, "event": "0x03000000" } } }"#).unwrap();
        let err = read_json(&path, &LedgerConfig::default()).unwrap_err();
        assert!(matches!(err, ExportError::Ledger(LedgerError::UnknownParent { parent_seq_no: 3 })));
    }

    #[test]
    fn csv_rows_follow_seq_order() {
        let ledger = sample_ledger();
        let mut buffer = Vec::new();
        write_csv(&ledger, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "seq_no,parent_seq_no,uid,pipeline,super_type,sub_type,mat_surf_id");
        assert_eq!(lines[1], "1,0,0x00000001_01000000,1,0,0,0");
        assert_eq!(lines[2], "2,1,0x00000002_03010001,3,0,1,1");
        assert_eq!(lines.len(), 3);
    }
}
