//! Frame extraction over the driver's read buffer.
//!
//! One extraction point serves both operating modes: in configuration mode
//! the buffer holds prompts and error texts, in acquisition mode it holds
//! binary ensembles whose grammar belongs to an [`EnsembleParser`].

use crate::constants::{ERROR_LEAD, ERROR_PREFIX, ERROR_TERMINATOR, PROMPT};
use crate::error::Result;
use crate::types::{ConfigurationFrame, Extraction, OperatingMode};

/// Binary frame grammar used in acquisition mode
pub trait EnsembleParser {
    type Ensemble;

    /// Length of the frame at the start of `window`, with the same
    /// incomplete / malformed / complete contract as configuration frames
    fn frame_length(&self, window: &[u8]) -> Extraction;

    /// Decode one complete frame previously delimited by `frame_length`
    fn decode(&mut self, frame: &[u8]) -> Result<Self::Ensemble>;
}

/// Delimit a configuration-mode reply at the start of `window`.
///
/// A prompt is a one-byte frame. An error text starts with `ER` and runs up
/// to the `\n>` that closes it; the terminator stays in the window.
pub fn configuration_frame_length(window: &[u8]) -> Extraction {
    match window.first() {
        None => Extraction::Incomplete,
        Some(&PROMPT) => Extraction::Frame(1),
        Some(&ERROR_LEAD) => {
            if window.get(1).is_some_and(|&b| b != ERROR_PREFIX[1]) {
                return Extraction::Malformed;
            }
            match window
                .get(2..)
                .and_then(|tail| tail.windows(2).position(|pair| pair == ERROR_TERMINATOR))
            {
                Some(offset) => Extraction::Frame(offset + 2),
                None => Extraction::Incomplete,
            }
        }
        Some(_) => Extraction::Malformed,
    }
}

/// Delimit the next frame according to the current operating mode
pub fn extract_frame<P: EnsembleParser>(mode: OperatingMode, window: &[u8], parser: &P) -> Extraction {
    match mode {
        OperatingMode::Configuration => configuration_frame_length(window),
        OperatingMode::Acquisition => parser.frame_length(window),
    }
}

/// Classify a frame delimited by [`configuration_frame_length`]
pub fn parse_configuration_frame(frame: &[u8]) -> ConfigurationFrame {
    if frame == [PROMPT] {
        ConfigurationFrame::Ack
    } else {
        ConfigurationFrame::Error(frame.to_vec())
    }
}

/// Render bytes for logging, escaping anything that is not printable ASCII
pub fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            b'\n' => "\\n".to_string(),
            b'\r' => "\\r".to_string(),
            0x20..=0x7E => (b as char).to_string(),
            _ => format!("\\x{:02X}", b),
        })
        .collect()
}
