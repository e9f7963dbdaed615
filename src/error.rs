//! Error types for DVL protocol operations.

use thiserror::Error;

/// Result type alias for DVL operations.
pub type Result<T> = std::result::Result<T, DvlError>;

/// Error types for DVL communication.
#[derive(Error, Debug)]
pub enum DvlError {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No complete frame arrived before the deadline
    #[error("Communication timeout")]
    Timeout,

    /// The device answered with an error message instead of a prompt.
    /// The text is kept as sent, minus a trailing carriage return.
    #[error("Device error: {0}")]
    Device(String),

    /// Operation requires configuration mode
    #[error("Not in configuration mode")]
    NotInConfigurationMode,

    /// Operation requires acquisition mode
    #[error("Not in acquisition mode")]
    NotInAcquisitionMode,

    /// Value does not fit the fixed-width numeric field of a command
    #[error("Value {value} does not fit in {width} digits of command {mnemonic}")]
    FieldOverflow {
        /// Command mnemonic
        mnemonic: String,
        /// Offending value
        value: i64,
        /// Number of digits the command accepts
        width: usize,
    },

    /// Setting cannot be expressed on the wire
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// Connection URI could not be interpreted
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// One step of a configuration sequence failed
    #[error("Failed to apply {setting}: {source}")]
    Setting {
        /// Name of the setting being applied
        setting: &'static str,
        /// Underlying failure
        #[source]
        source: Box<DvlError>,
    },

    /// Configuration file could not be (de)serialized
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Data parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DvlError {
    /// Wraps this error with the name of the setting that produced it.
    pub fn in_setting(self, setting: &'static str) -> Self {
        DvlError::Setting {
            setting,
            source: Box::new(self),
        }
    }

    /// True if the error is (or wraps) a read timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            DvlError::Timeout => true,
            DvlError::Setting { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}
