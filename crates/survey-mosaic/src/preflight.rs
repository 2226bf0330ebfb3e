//! Existence checks run before any array work or output.

use std::path::Path;

use crate::error::{Error, Result};

/// Fail if a required input is not a readable file.
pub fn require_input(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingInput(path.to_path_buf()))
    }
}

/// Fail if `path` exists and overwriting was not requested.
pub fn check_output(path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(Error::OutputExists(path.to_path_buf()));
    }
    Ok(())
}
