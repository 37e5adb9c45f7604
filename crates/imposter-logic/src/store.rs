//! Persistence for the optimizer: the poor-variant blacklist and the run history.
//!
//! Both stores sit behind small traits so the controller can run against
//! files in the harness and against memory in tests.
//!
//! - Poor variants: one genome per line, alleles comma-separated.
//! - Run history: one JSON object per line, one line per generation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::genome::Genome;

/// Genomes known to score zero; never bred again.
pub trait PoorVariantStore {
    /// Snapshot of every stored genome.
    fn load(&self) -> HashSet<Genome>;
    fn append(&mut self, genomes: &[Genome]) -> Result<(), StoreError>;
}

/// Best genome of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopVariantRecord {
    pub generation: usize,
    pub fitness: f64,
    pub genome: Genome,
}

/// Sink for per-generation results.
pub trait RunHistory {
    fn record(&mut self, record: &TopVariantRecord) -> Result<(), StoreError>;
}

/// Errors that can occur while writing a store
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Json(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Line-per-genome text file.
pub struct FilePoorVariantStore {
    path: PathBuf,
}

impl FilePoorVariantStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PoorVariantStore for FilePoorVariantStore {
    fn load(&self) -> HashSet<Genome> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                log::warn!(
                    "Poor variant file {} unavailable ({}), starting empty",
                    self.path.display(),
                    e
                );
                return HashSet::new();
            }
        };

        let mut genomes = HashSet::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::warn!("Stopped reading {} at line {}: {}", self.path.display(), number + 1, e);
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<Genome>() {
                Ok(genome) => {
                    genomes.insert(genome);
                }
                Err(e) => log::warn!("Skipping line {} of {}: {}", number + 1, self.path.display(), e),
            }
        }
        genomes
    }

    fn append(&mut self, genomes: &[Genome]) -> Result<(), StoreError> {
        if genomes.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for genome in genomes {
            writeln!(file, "{genome}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPoorVariantStore {
    genomes: HashSet<Genome>,
}

impl MemoryPoorVariantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }
}

impl PoorVariantStore for MemoryPoorVariantStore {
    fn load(&self) -> HashSet<Genome> {
        self.genomes.clone()
    }

    fn append(&mut self, genomes: &[Genome]) -> Result<(), StoreError> {
        self.genomes.extend(genomes.iter().copied());
        Ok(())
    }
}

/// JSON-lines history file, appended to.
pub struct JsonlRunHistory {
    file: File,
}

impl JsonlRunHistory {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl RunHistory for JsonlRunHistory {
    fn record(&mut self, record: &TopVariantRecord) -> Result<(), StoreError> {
        serde_json::to_writer(&mut self.file, record)?;
        writeln!(self.file)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRunHistory {
    pub records: Vec<TopVariantRecord>,
}

impl MemoryRunHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunHistory for MemoryRunHistory {
    fn record(&mut self, record: &TopVariantRecord) -> Result<(), StoreError> {
        self.records.push(record.clone());
        Ok(())
    }
}
