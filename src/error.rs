//! Error types for KampanIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// KampanIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be written
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Communication timeout
    #[error("Communication timeout")]
    Timeout,

    /// Discovery handshake exhausted its retries
    #[error("Discovery failed after {attempts} attempts")]
    DiscoveryFailed {
        /// Number of discovery attempts made
        attempts: u32,
    },

    /// Operation requires a connected link
    #[error("Link is not connected")]
    NotConnected,

    /// Calibration profile failed its variance bound and must not be applied
    #[error("Calibration profile is not valid")]
    InvalidCalibration,

    /// Axis mapping assignments do not form a permutation of {0,1,2}
    #[error("Axis mapping is not a bijection: {assignments:?}")]
    NotBijective {
        /// The raw channel assigned to each logical axis
        assignments: [usize; 3],
    },

    /// Sample stream ran dry before a procedure collected enough samples
    #[error("Insufficient samples: got {got}, wanted {wanted}")]
    InsufficientSamples {
        /// Samples collected before the stream ran dry
        got: usize,
        /// Samples the procedure needed
        wanted: usize,
    },

    /// Sample subscription channel closed
    #[error("Sample channel closed")]
    ChannelClosed,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
