//! # Teledyne DVL Library
//!
//! A Rust library for driving Teledyne RD Instruments Explorer Doppler
//! Velocity Logs over a serial link. It moves the device between its ASCII
//! configuration mode and its binary PD0 acquisition mode, and encodes every
//! configuration command with the digit, sign and unit formatting the device
//! expects.
//!
//! ## Features
//!
//! - Reliable entry into configuration mode from any device state (break + prompt probing)
//! - One extraction point for prompts, error replies and PD0 ensembles
//! - Typed setters for bottom-track, environmental, timing and profiling settings
//! - Full configuration transactions with commit to non-volatile memory
//! - Pluggable transport and ensemble grammar
//!
//! ## Example
//!
//! ```no_run
//! use teledyne_dvl::{Config, SerialDvl};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut dvl = SerialDvl::connect("serial:///dev/ttyUSB0:9600")?;
//!     dvl.set_configuration_mode()?;
//!     dvl.apply_config(&Config::default())?;
//!     dvl.start_acquisition()?;
//!     let ensemble = dvl.read_ensemble()?;
//!     println!("{} bytes at {}", ensemble.data.bytes.len(), ensemble.received_at);
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod constants;
pub mod error;
pub mod framing;
pub mod pd0;
pub mod protocol;
pub mod transport;
pub mod types;

pub use error::{DvlError, Result};
pub use framing::EnsembleParser;
pub use pd0::{Pd0Framer, RawEnsemble};
pub use protocol::{Dvl, SerialDvl};
pub use transport::{SerialTransport, Transport};
pub use types::*;
