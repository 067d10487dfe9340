//! Slide deck traversal engine.
//!
//! Loads a web-based presentation into a rendering engine, works out which
//! framework drives it, then repeatedly captures the current step and
//! advances to the next one until the deck ends. See [`traverse`] for the
//! event stream and [`run_traversal`] for the collected result.

pub mod capture;
pub mod error;
pub mod framework;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod navigator;
pub mod oracle;
pub mod page;
pub mod position;
mod run;
pub mod session;
pub mod strategy;
pub mod wait;

pub use crate::run::{
    Summary, Traversal, TraversalEvent, TraversalOptions, TraversalRequest, detect_framework, run_traversal, traverse,
};
