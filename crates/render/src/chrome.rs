use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};

/// Executable names searched for on `PATH`, in order of preference.
const EXECUTABLES: [&str; 5] = ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser", "chrome"];

/// A Chrome/Chromium executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chrome {
    path: PathBuf,
}
impl Chrome {
    /// Search `PATH` for a Chrome or Chromium binary.
    pub fn discover() -> Result<Self> {
        // TODO: What are the executable names on Windows? macOS?
        for exe in EXECUTABLES {
            if let Ok(path) = which::which(exe) {
                tracing::debug!(path = %path.display(), "Discovered Chrome executable");
                return Ok(Self { path });
            }
        }
        tracing::info!("Chrome executable not found in PATH");
        exn::bail!(ErrorKind::ChromeNotFound);
    }

    /// Use a specific executable instead of searching for one.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            exn::bail!(ErrorKind::ExecutableMissing(path.display().to_string()));
        }
        Ok(Self { path })
    }

    /// Use `path` when given, otherwise [discover](Self::discover).
    pub fn locate(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::at(path),
            None => Self::discover(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
