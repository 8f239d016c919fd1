// Position-aligned record payloads for an index
// Line i of the metadata JSONL belongs to vector i of the corpus index

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::{RagError, Result};

/// English/Spanish sentence pair from the parallel corpora
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    #[serde(alias = "en")]
    pub source_text: String,
    #[serde(alias = "es")]
    pub target_text: String,
    /// Corpus the pair was drawn from (e.g. "tatoeba", "europarl")
    #[serde(alias = "source")]
    pub provenance: String,
}

/// One chunk of a city travel guide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelChunk {
    pub text: String,
    pub chunk_id: String,
    pub city: String,
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    SentencePair,
    TravelChunk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    SentencePair(SentencePair),
    TravelChunk(TravelChunk),
}

impl RecordKind {
    /// Parse one metadata line as this kind of record
    #[inline]
    pub fn parse_line(self, line: &str) -> serde_json::Result<Record> {
        Ok(match self {
            Self::SentencePair => Record::SentencePair(serde_json::from_str(line)?),
            Self::TravelChunk => Record::TravelChunk(serde_json::from_str(line)?),
        })
    }
}

impl std::fmt::Display for RecordKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SentencePair => write!(f, "sentence-pair"),
            Self::TravelChunk => write!(f, "travel-chunk"),
        }
    }
}

impl Record {
    #[inline]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::SentencePair(_) => RecordKind::SentencePair,
            Self::TravelChunk(_) => RecordKind::TravelChunk,
        }
    }

    /// Text that gets embedded when the index is built
    #[inline]
    pub fn indexed_text(&self) -> &str {
        match self {
            Self::SentencePair(pair) => &pair.source_text,
            Self::TravelChunk(chunk) => &chunk.text,
        }
    }

    /// Short human-readable form used in logs, reports and tool output
    #[inline]
    pub fn summary(&self) -> String {
        match self {
            Self::SentencePair(pair) => format!("{} -> {}", pair.source_text, pair.target_text),
            Self::TravelChunk(chunk) => chunk.text.clone(),
        }
    }
}

/// Read-only, ordered records of one corpus
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataStore {
    kind: RecordKind,
    records: Vec<Record>,
}

impl MetadataStore {
    /// Load newline-delimited JSON; every line must be a complete record of `kind`
    #[inline]
    pub fn load(path: &Path, kind: RecordKind) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let store = Self::parse(&content, kind).map_err(|e| match e {
            RagError::Metadata(msg) => RagError::Metadata(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        info!(
            "Loaded {} {} records from {}",
            store.len(),
            kind,
            path.display()
        );
        Ok(store)
    }

    #[inline]
    pub fn parse(content: &str, kind: RecordKind) -> Result<Self> {
        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                // A gap would shift every later record off its vector
                return Err(RagError::Metadata(format!(
                    "line {} is blank",
                    line_no + 1
                )));
            }
            let record = kind.parse_line(line).map_err(|e| {
                RagError::Metadata(format!("line {}: {}", line_no + 1, e))
            })?;
            records.push(record);
        }
        debug!("Parsed {} {} records", records.len(), kind);
        Ok(Self { kind, records })
    }

    /// Wrap already-built records; all must be of `kind`
    #[inline]
    pub fn from_records(kind: RecordKind, records: Vec<Record>) -> Result<Self> {
        if let Some((position, record)) = records
            .iter()
            .enumerate()
            .find(|(_, record)| record.kind() != kind)
        {
            return Err(RagError::Metadata(format!(
                "record {} is a {} but the store holds {} records",
                position,
                record.kind(),
                kind
            )));
        }
        Ok(Self { kind, records })
    }

    #[inline]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at a vector position; out of range means index and store disagree
    #[inline]
    pub fn get(&self, position: usize) -> Result<&Record> {
        self.records.get(position).ok_or_else(|| {
            RagError::Integrity(format!(
                "position {} outside metadata store of {} records",
                position,
                self.records.len()
            ))
        })
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Write the records back out as JSONL, one per line in position order
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = std::io::BufWriter::new(fs::File::create(path)?);
        for record in &self.records {
            serde_json::to_writer(&mut file, record)
                .map_err(|e| RagError::Metadata(format!("failed to serialize record: {}", e)))?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        info!("Wrote {} records to {}", self.len(), path.display());
        Ok(())
    }
}
