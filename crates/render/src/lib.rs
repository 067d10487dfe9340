mod chrome;
mod engine;
pub mod error;

pub use crate::chrome::Chrome;
use crate::error::Result;
pub use crate::engine::{ChromeLauncher, ChromeOptions};
use std::path::Path;

impl ChromeLauncher {
    /// A launcher for the Chrome at `executable`, or the first one found on
    /// `PATH` when none is given.
    pub fn locate(executable: Option<&Path>, options: ChromeOptions) -> Result<Self> {
        Ok(Self::new(Chrome::locate(executable)?, options))
    }
}
