//! Minimal FITS container: one primary HDU holding an N-dimensional image and
//! an ordered keyword → (value, comment) header.

pub mod block;
pub mod header;
pub mod image;
pub mod value;

pub use header::{Card, Header, Verify};
pub use image::{read_fits, write_fits, ImageHdu};
pub use value::Value;
