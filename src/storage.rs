use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::observation::FrameObservation;

/// Destination for per-frame observations.
pub trait ObservationStore {
    fn append(&mut self, observation: &FrameObservation) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Observations appended so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// On-disk observation log format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Jsonl,
    Sqlite,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            "sqlite" | "db" => Ok(LogFormat::Sqlite),
            other => Err(anyhow!("unknown log format '{}' (expected jsonl or sqlite)", other)),
        }
    }
}

/// Open a file-backed store in the given format.
pub fn open_store(path: &Path, format: LogFormat) -> Result<Box<dyn ObservationStore>> {
    Ok(match format {
        LogFormat::Jsonl => Box::new(JsonlObservationStore::create(path)?),
        LogFormat::Sqlite => Box::new(SqliteObservationStore::open(path)?),
    })
}

// ----------------------------------------------------------------------------
// SQLite
// ----------------------------------------------------------------------------

pub struct SqliteObservationStore {
    conn: Connection,
    appended: usize,
}

impl SqliteObservationStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("open observation database {}", db_path.display()))?;
        let mut store = Self { conn, appended: 0 };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut store = Self {
            conn: Connection::open_in_memory()?,
            appended: 0,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS frame_observations (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              frame_index INTEGER NOT NULL,
              stage TEXT NOT NULL,
              instance_count INTEGER NOT NULL,
              oocyte_area REAL,
              oocyte_circularity REAL,
              payload_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_observations_frame ON frame_observations(frame_index);
            "#,
        )?;
        Ok(())
    }

    /// All stored observations in insertion order.
    pub fn read_all(&self) -> Result<Vec<FrameObservation>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM frame_observations ORDER BY id ASC")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            out.push(serde_json::from_str(&payload)?);
        }
        Ok(out)
    }
}

impl ObservationStore for SqliteObservationStore {
    fn append(&mut self, observation: &FrameObservation) -> Result<()> {
        let frame_index = i64::try_from(observation.frame_index)
            .map_err(|_| anyhow!("frame index exceeds i64 range"))?;
        let payload_json = serde_json::to_string(observation)?;
        self.conn.execute(
            r#"
            INSERT INTO frame_observations(
              frame_index, stage, instance_count, oocyte_area, oocyte_circularity, payload_json
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                frame_index,
                observation.stage.key(),
                observation.instance_count as i64,
                observation.oocyte_area,
                observation.oocyte_circularity,
                payload_json
            ],
        )?;
        self.appended += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.appended
    }
}

// ----------------------------------------------------------------------------
// JSON lines
// ----------------------------------------------------------------------------

/// One JSON object per line.
pub struct JsonlObservationStore {
    writer: BufWriter<File>,
    appended: usize,
}

impl JsonlObservationStore {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log directory {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("create observation log {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            appended: 0,
        })
    }

    pub fn read_all(path: &Path) -> Result<Vec<FrameObservation>> {
        let file = File::open(path)
            .with_context(|| format!("open observation log {}", path.display()))?;
        let mut out = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let observation = serde_json::from_str(&line)
                .with_context(|| format!("observation log line {}", lineno + 1))?;
            out.push(observation);
        }
        Ok(out)
    }
}

impl ObservationStore for JsonlObservationStore {
    fn append(&mut self, observation: &FrameObservation) -> Result<()> {
        serde_json::to_writer(&mut self.writer, observation)?;
        self.writer.write_all(b"\n")?;
        self.appended += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.appended
    }
}

// ----------------------------------------------------------------------------
// In memory
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct InMemoryObservationStore {
    observations: Vec<FrameObservation>,
}

impl InMemoryObservationStore {
    pub fn observations(&self) -> &[FrameObservation] {
        &self.observations
    }
}

impl ObservationStore for InMemoryObservationStore {
    fn append(&mut self, observation: &FrameObservation) -> Result<()> {
        self.observations.push(observation.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.observations.len()
    }
}
