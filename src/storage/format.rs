//! Binary format for trained maps.
//!
//! ## Format Layout
//!
//! ```text
//! +------------------+
//! | Header (64 bytes)|
//! +------------------+
//! | Codebook         |
//! | (units x dim f64)|
//! +------------------+
//! | Map config       |
//! | (bincode)        |
//! +------------------+
//! ```
//!
//! ### Header (64 bytes)
//! - Magic number (4 bytes): "KSOM"
//! - Version (2 bytes)
//! - Unit shape (1 byte): 0 = hexagon, 1 = rectangle
//! - Reserved (1 byte)
//! - Grid rows (4 bytes)
//! - Grid columns (4 bytes)
//! - Feature dimension (4 bytes)
//! - Reserved (4 bytes)
//! - Codebook offset (8 bytes)
//! - Config offset (8 bytes)
//! - Config length (8 bytes)
//! - Reserved (16 bytes)
//!
//! All integers and codebook values are little-endian. The codebook is
//! stored row-major, one row per lattice unit.

use crate::config::MapConfig;
use crate::error::{Result, SomError};
use crate::som::UnitShape;
use ndarray::{Array2, ArrayView2};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Magic number for model files.
const MAGIC: &[u8; 4] = b"KSOM";

/// Current format version.
const VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Model file header.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHeader {
    /// Format version.
    pub version: u16,
    /// Unit shape of the lattice.
    pub shape: UnitShape,
    /// Lattice rows.
    pub rows: u32,
    /// Lattice columns.
    pub cols: u32,
    /// Feature dimension of the codebook.
    pub dim: u32,
    /// Offset to the codebook.
    pub codebook_offset: u64,
    /// Offset to the serialized map config.
    pub config_offset: u64,
    /// Length of the serialized map config.
    pub config_len: u64,
}

impl ModelHeader {
    /// Creates a header for a codebook of `rows * cols` units.
    pub fn new(shape: UnitShape, rows: u32, cols: u32, dim: u32) -> Self {
        let codebook_len = codebook_bytes(rows, cols, dim).unwrap_or(u64::MAX);
        Self {
            version: VERSION,
            shape,
            rows,
            cols,
            dim,
            codebook_offset: HEADER_SIZE as u64,
            config_offset: codebook_len.saturating_add(HEADER_SIZE as u64),
            config_len: 0, // Set during write
        }
    }

    /// Number of lattice units.
    pub fn units(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Size of the codebook section in bytes, `None` on overflow.
    pub fn codebook_len(&self) -> Option<u64> {
        codebook_bytes(self.rows, self.cols, self.dim)
    }

    /// Writes the header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(MAGIC);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6] = self.shape.to_tag();
        bytes[8..12].copy_from_slice(&self.rows.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.cols.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.dim.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.codebook_offset.to_le_bytes());
        bytes[32..40].copy_from_slice(&self.config_offset.to_le_bytes());
        bytes[40..48].copy_from_slice(&self.config_len.to_le_bytes());
        // Reserved (bytes 48-63)
        bytes
    }

    /// Reads a header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SomError::InvalidModelFormat("Header too short".to_string()));
        }
        if &bytes[0..4] != MAGIC {
            return Err(SomError::InvalidModelFormat(
                "Invalid magic number".to_string(),
            ));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(SomError::InvalidModelFormat(format!(
                "Unsupported version: {}",
                version
            )));
        }
        let shape = UnitShape::from_tag(bytes[6]).ok_or_else(|| {
            SomError::InvalidModelFormat(format!("Unknown unit shape tag: {}", bytes[6]))
        })?;

        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let u64_at = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(buf)
        };

        Ok(Self {
            version,
            shape,
            rows: u32_at(8),
            cols: u32_at(12),
            dim: u32_at(16),
            codebook_offset: u64_at(24),
            config_offset: u64_at(32),
            config_len: u64_at(40),
        })
    }
}

fn codebook_bytes(rows: u32, cols: u32, dim: u32) -> Option<u64> {
    (rows as u64)
        .checked_mul(cols as u64)?
        .checked_mul(dim as u64)?
        .checked_mul(8)
}

/// Checks that `len` bytes at `offset` lie inside a file of `file_len` bytes.
fn check_section(what: &str, offset: u64, len: u64, file_len: u64) -> Result<usize> {
    let end = offset.checked_add(len).ok_or_else(|| {
        SomError::InvalidModelFormat(format!("{} section overflows: offset {}, length {}", what, offset, len))
    })?;
    if offset < HEADER_SIZE as u64 || end > file_len {
        return Err(SomError::InvalidModelFormat(format!(
            "{} section [{}, {}) outside file of {} bytes",
            what, offset, end, file_len
        )));
    }
    usize::try_from(len)
        .map_err(|_| SomError::InvalidModelFormat(format!("{} section too large: {} bytes", what, len)))
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| SomError::InvalidModelFormat(format!("{} too large: {}", what, value)))
}

/// Binary format reader/writer for model files.
pub struct ModelFormat;

impl ModelFormat {
    /// Writes a map config and its codebook to `path`.
    pub fn write<P: AsRef<Path>>(path: P, config: &MapConfig, codebook: ArrayView2<f64>) -> Result<()> {
        config.validate()?;
        let (rows, cols) = (config.grid.size[0], config.grid.size[1]);
        if codebook.nrows() != rows * cols {
            return Err(SomError::DimensionMismatch {
                context: "model codebook",
                expected: rows * cols,
                found: codebook.nrows(),
            });
        }

        let config_bytes = bincode::serialize(config)?;
        let mut header = ModelHeader::new(
            config.grid.shape,
            to_u32(rows, "grid rows")?,
            to_u32(cols, "grid columns")?,
            to_u32(codebook.ncols(), "feature dimension")?,
        );
        header.config_len = config_bytes.len() as u64;

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&header.to_bytes())?;
        for value in codebook.iter() {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.write_all(&config_bytes)?;

        writer.flush()?;
        Ok(())
    }

    /// Reads only the header of a model file.
    pub fn read_header<P: AsRef<Path>>(path: P) -> Result<ModelHeader> {
        let mut file = File::open(path)?;
        let mut header_bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;
        ModelHeader::from_bytes(&header_bytes)
    }

    /// Reads a model file.
    ///
    /// Returns (header, map config, codebook).
    pub fn read<P: AsRef<Path>>(path: P) -> Result<(ModelHeader, MapConfig, Array2<f64>)> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;
        let header = ModelHeader::from_bytes(&header_bytes)?;

        if header.rows == 0 || header.cols == 0 || header.dim == 0 {
            return Err(SomError::InvalidModelFormat(format!(
                "Empty codebook: {}x{} units, {} dim",
                header.rows, header.cols, header.dim
            )));
        }
        let codebook_len = header.codebook_len().ok_or_else(|| {
            SomError::InvalidModelFormat(format!(
                "Codebook size overflows: {}x{} units, {} dim",
                header.rows, header.cols, header.dim
            ))
        })?;
        let codebook_len = check_section("codebook", header.codebook_offset, codebook_len, file_len)?;
        let config_len = check_section("config", header.config_offset, header.config_len, file_len)?;

        let units = header.units();
        let dim = header.dim as usize;

        // Read codebook
        reader.seek(SeekFrom::Start(header.codebook_offset))?;
        let mut raw = vec![0u8; codebook_len];
        reader.read_exact(&mut raw)?;
        let values: Vec<f64> = raw
            .chunks_exact(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                f64::from_le_bytes(buf)
            })
            .collect();
        let codebook = Array2::from_shape_vec((units, dim), values)
            .map_err(|e| SomError::InvalidModelFormat(e.to_string()))?;

        // Read map config
        reader.seek(SeekFrom::Start(header.config_offset))?;
        let mut config_bytes = vec![0u8; config_len];
        reader.read_exact(&mut config_bytes)?;
        let config: MapConfig = bincode::deserialize(&config_bytes)?;

        let size = [header.rows as usize, header.cols as usize];
        if config.grid.size != size || config.grid.shape != header.shape {
            return Err(SomError::InvalidModelFormat(format!(
                "Header grid {:?} {} does not match config grid {:?} {}",
                size, header.shape, config.grid.size, config.grid.shape
            )));
        }

        Ok((header, config, codebook))
    }
}
