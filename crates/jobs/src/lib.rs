//! Background capture jobs.
//!
//! A job traverses a deck in bounded batches, each in a fresh engine, and
//! assembles everything it captured into one PDF. Progress is broadcast to
//! any number of subscribers, and finished jobs expire from the store.

pub mod error;
mod job;
mod runner;
pub mod store;

pub use crate::job::{Job, JobId, JobStatus};
pub use crate::runner::{JobEvent, JobOptions, Runner};
pub use crate::store::{JobStore, MemoryJobStore, StoreHandle, spawn_evictor};
