use std::path::PathBuf;

use crate::survey::Species;

/// All errors that can occur while extracting, reconstructing or splitting a mosaic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed FITS header block.
    #[error("invalid FITS header: {0}")]
    InvalidHeader(&'static str),
    /// Premature end of data while reading.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Unrecognized BITPIX value.
    #[error("invalid BITPIX value: {0}")]
    InvalidBitpix(i64),
    /// Keyword that cannot be written even after header repair.
    #[error("invalid keyword name: {0:?}")]
    InvalidKeyword(String),
    /// A required keyword was not found in the header.
    #[error("missing required keyword: {0}")]
    MissingKeyword(String),
    /// The output file exists and overwriting was not requested.
    #[error("output file already exists: {}", .0.display())]
    OutputExists(PathBuf),
    /// A required input file (cube or correction catalog) is missing.
    #[error("required input file not found: {}", .0.display())]
    MissingInput(PathBuf),
    /// The species is outside the set a component accepts.
    #[error("{operation} is not implemented for species {species}")]
    UnsupportedSpecies {
        species: Species,
        operation: &'static str,
    },
    /// The requested region cannot be mapped onto the cube.
    #[error("invalid region: {0}")]
    InvalidRegion(String),
    /// The requested split cannot be carried out on the cube.
    #[error("invalid partition: {0}")]
    InvalidPartition(String),
    /// A correction catalog line could not be parsed.
    #[error("correction catalog line {line}: {reason}")]
    Catalog { line: usize, reason: String },
    /// A correction record decodes to a voxel outside the cube.
    #[error("correction catalog line {line}: voxel {voxel:?} outside cube of shape {shape:?}")]
    VoxelOutOfBounds {
        line: usize,
        voxel: [usize; 3],
        shape: Vec<usize>,
    },
    /// Configuration value missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
    /// TOML syntax or schema error in the configuration file.
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// Array shape mismatch while assembling a cube.
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    /// An I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
