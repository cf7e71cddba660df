//! Persistence for the job index as two co-located files.
//!
//! `jobs.json` holds the job records as a JSON array in index order.
//!
//! `jobs.index` holds the vectors:
//!
//! Header (51 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - records_checksum: u32 (CRC32 of the jobs.json bytes)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated entry_count times):
//! - embedding: [f32; dimensions] (little-endian)

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::jobs::JobRecord;
use crate::semantic::index::VectorIndex;

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// version(1) + model_id(32) + dimensions(2) + entry_count(8) + records_checksum(4) + checksum(4)
const HEADER_SIZE: usize = 51;

/// Bytes covered by the header checksum.
const CHECKSUMMED_LEN: usize = HEADER_SIZE - 4;

pub const INDEX_FILE_NAME: &str = "jobs.index";
pub const RECORDS_FILE_NAME: &str = "jobs.json";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexStorageError {
    #[error("Index file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed job records: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file uses different model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Job records do not belong to this index")]
    RecordsMismatch,

    #[error("Dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Index holds {vectors} vectors but {records} job records")]
    RecordCountMismatch { vectors: u64, records: usize },
}

/// Location of a persisted index pair.
#[derive(Debug, Clone)]
pub struct IndexStorage {
    index_path: PathBuf,
    records_path: PathBuf,
}

impl IndexStorage {
    pub fn new(index_path: PathBuf, records_path: PathBuf) -> Self {
        Self {
            index_path,
            records_path,
        }
    }

    /// `<dir>/jobs.index` and `<dir>/jobs.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(INDEX_FILE_NAME), dir.join(RECORDS_FILE_NAME))
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    #[cfg(test)]
    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    /// True only when both halves are present.
    #[cfg(test)]
    pub fn exists(&self) -> bool {
        self.index_path.exists() && self.records_path.exists()
    }

    /// Load both halves. Fails with `NotFound` if either file is absent.
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<VectorIndex, IndexStorageError> {
        for path in [&self.index_path, &self.records_path] {
            if !path.exists() {
                return Err(IndexStorageError::NotFound(path.clone()));
            }
        }

        let mut reader = BufReader::new(File::open(&self.index_path)?);
        let header = Self::read_header(&mut reader)?;
        Self::validate_header(&header, expected_model_id, expected_dimensions)?;

        let records_bytes = std::fs::read(&self.records_path)?;
        if crc32fast::hash(&records_bytes) != header.records_checksum {
            return Err(IndexStorageError::RecordsMismatch);
        }

        let records: Vec<JobRecord> = serde_json::from_slice(&records_bytes)?;
        if records.len() as u64 != header.entry_count {
            return Err(IndexStorageError::RecordCountMismatch {
                vectors: header.entry_count,
                records: records.len(),
            });
        }

        let vectors = Self::read_vectors(&mut reader, &header)?;

        log::debug!(
            "loaded {} vectors of width {} from {} (format v{})",
            header.entry_count,
            header.dimensions,
            self.index_path.display(),
            header.version
        );

        Ok(VectorIndex::from_parts(
            header.dimensions as usize,
            vectors,
            records,
        ))
    }

    /// Save both halves. Each file is written to a temp file in its target
    /// directory and renamed into place; temp files are removed on error.
    pub fn save(&self, index: &VectorIndex, model_id: &[u8; 32]) -> Result<(), IndexStorageError> {
        let dimensions = u16::try_from(index.dimensions()).map_err(|_| {
            IndexStorageError::InvalidFormat(format!(
                "{} dimensions do not fit the header",
                index.dimensions()
            ))
        })?;

        let records_bytes = serde_json::to_vec(index.records())?;

        let header = Header {
            version: FORMAT_VERSION,
            model_id: *model_id,
            dimensions,
            entry_count: index.len() as u64,
            records_checksum: crc32fast::hash(&records_bytes),
        };

        let index_tmp = Self::temp_file_for(&self.index_path)?;
        let records_tmp = Self::temp_file_for(&self.records_path)?;

        Self::write_index(index_tmp.as_file(), &header, index)?;
        Self::write_records(records_tmp.as_file(), &records_bytes)?;

        records_tmp
            .persist(&self.records_path)
            .map_err(|e| IndexStorageError::Io(e.error))?;
        index_tmp
            .persist(&self.index_path)
            .map_err(|e| IndexStorageError::Io(e.error))?;

        Ok(())
    }

    fn temp_file_for(path: &Path) -> Result<NamedTempFile, IndexStorageError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        Ok(NamedTempFile::new_in(dir)?)
    }

    fn write_index(file: &File, header: &Header, index: &VectorIndex) -> Result<(), IndexStorageError> {
        let mut writer = BufWriter::new(file);
        writer.write_all(&header.to_bytes())?;

        for vector in index.vectors() {
            for &value in vector {
                writer.write_all(&value.to_le_bytes())?;
            }
        }

        writer.flush()?;
        file.sync_all()?;
        Ok(())
    }

    fn write_records(file: &File, records_bytes: &[u8]) -> Result<(), IndexStorageError> {
        let mut writer = BufWriter::new(file);
        writer.write_all(records_bytes)?;
        writer.flush()?;
        file.sync_all()?;
        Ok(())
    }

    fn read_header(reader: &mut impl Read) -> Result<Header, IndexStorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                IndexStorageError::InvalidFormat("file shorter than header".to_string())
            }
            _ => IndexStorageError::Io(e),
        })?;

        let version = header_bytes[0];
        if version > FORMAT_VERSION {
            return Err(IndexStorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let stored_checksum = le_u32(&header_bytes[CHECKSUMMED_LEN..HEADER_SIZE]);
        if crc32fast::hash(&header_bytes[..CHECKSUMMED_LEN]) != stored_checksum {
            return Err(IndexStorageError::ChecksumMismatch);
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&header_bytes[1..33]);

        Ok(Header {
            version,
            model_id,
            dimensions: u16::from_le_bytes([header_bytes[33], header_bytes[34]]),
            entry_count: u64::from_le_bytes([
                header_bytes[35],
                header_bytes[36],
                header_bytes[37],
                header_bytes[38],
                header_bytes[39],
                header_bytes[40],
                header_bytes[41],
                header_bytes[42],
            ]),
            records_checksum: le_u32(&header_bytes[43..47]),
        })
    }

    fn validate_header(
        header: &Header,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<(), IndexStorageError> {
        if header.model_id != *expected_model_id {
            return Err(IndexStorageError::ModelMismatch);
        }

        if header.dimensions as usize != expected_dimensions {
            return Err(IndexStorageError::DimensionMismatch {
                expected: expected_dimensions,
                got: header.dimensions as usize,
            });
        }

        Ok(())
    }

    fn read_vectors(reader: &mut impl Read, header: &Header) -> Result<Vec<f32>, IndexStorageError> {
        let values = header.entry_count as usize * header.dimensions as usize;
        let mut bytes = vec![0u8; values * 4];
        reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => IndexStorageError::InvalidFormat(format!(
                "expected {} vectors, file is truncated",
                header.entry_count
            )),
            _ => IndexStorageError::Io(e),
        })?;

        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// File header structure.
#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
    records_checksum: u32,
}

impl Header {
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut header_bytes = [0u8; HEADER_SIZE];

        header_bytes[0] = self.version;
        header_bytes[1..33].copy_from_slice(&self.model_id);
        header_bytes[33..35].copy_from_slice(&self.dimensions.to_le_bytes());
        header_bytes[35..43].copy_from_slice(&self.entry_count.to_le_bytes());
        header_bytes[43..47].copy_from_slice(&self.records_checksum.to_le_bytes());

        let checksum = crc32fast::hash(&header_bytes[..CHECKSUMMED_LEN]);
        header_bytes[CHECKSUMMED_LEN..HEADER_SIZE].copy_from_slice(&checksum.to_le_bytes());

        header_bytes
    }
}
