//! Extraction, reconstruction and splitting of Galactic survey mosaics.
//!
//! A survey cube is loaded into an [`Observation`], mapped onto a pixel
//! region by [`region`], cropped by [`crop`] and written with a header built
//! by [`metadata`]. Derived HI species are rebuilt from a correction
//! catalog by [`catalog`] instead. [`split`] cuts an extracted mosaic into
//! contiguous sub-mosaics.

pub mod catalog;
pub mod config;
pub mod crop;
pub mod error;
pub mod extract;
pub mod fits;
pub mod geometry;
pub mod metadata;
pub mod observation;
pub mod preflight;
pub mod region;
pub mod split;
pub mod stats;
pub mod survey;

pub use config::Config;
pub use error::{Error, Result};
pub use extract::{Extraction, MosaicExtractor};
pub use observation::{Identity, Observation};
pub use survey::{Species, Survey};
