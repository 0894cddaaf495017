//! Request orchestration
//!
//! Turns one favorites browse or search into a flat list of songs by
//! fanning out over artists, albums and album covers.

pub mod covers;
pub mod errors;
pub mod events;
pub mod orchestrator;
pub mod pagination;
pub mod tracker;

#[cfg(test)]
pub mod mocks;

pub use covers::{CoverFetcher, DiskCoverCache};
pub use events::{Outcome, RequestEvent};
pub use orchestrator::{LogicalRequest, RequestOrchestrator};
