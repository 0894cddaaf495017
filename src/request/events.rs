//! Events a request reports to its caller

use crate::tidal::SongRecord;

/// How a request ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// At least one song was collected
    Success(Vec<SongRecord>),
    /// Nothing was collected and the server said so explicitly
    NoMatch,
    /// Nothing was collected because of errors
    Error(String),
}

impl Outcome {
    pub fn songs(&self) -> &[SongRecord] {
        match self {
            Self::Success(songs) => songs,
            _ => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Progress updates sent while a request runs
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    /// Human readable progress text
    Status(String),
    /// New upper bound for the progress indicator
    ProgressMax(usize),
    /// New position of the progress indicator
    Progress(usize),
    /// Terminal event, sent exactly once unless the request is cancelled.
    /// `search_id` is set for searches only.
    Finished {
        search_id: Option<u32>,
        outcome: Outcome,
    },
}
