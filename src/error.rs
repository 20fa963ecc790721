use thiserror::Error;

/// Result type for playback engine operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Errors that can occur during playback engine operations
///
/// Only conditions that would corrupt the eligibility/window invariants are
/// surfaced as errors; data-dependent degradations (empty eligible set,
/// all-NaN buckets) are reported through the dispatched state instead.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Series '{series}' has {actual} samples, expected {expected}")]
    MismatchedLength {
        series: String,
        expected: usize,
        actual: usize,
    },

    #[error("Time axis is not sorted ascending at index {0}")]
    UnsortedTimes(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No data loaded: call setup_data before {0}")]
    DataNotLoaded(&'static str),
}
