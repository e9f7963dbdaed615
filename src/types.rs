use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::DEFAULT_BAUD_RATE;
use crate::error::{DvlError, Result};

/// Protocol state of the device as tracked by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Line-oriented ASCII commands, answered by a prompt or an error text
    Configuration,
    /// Continuous binary ensemble output
    Acquisition,
}

/// Outcome of a frame extraction attempt over the buffered bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// More bytes are needed before a frame can be recognized
    Incomplete,
    /// The leading byte cannot start a frame; drop it and retry
    Malformed,
    /// The first `n` bytes form one complete frame
    Frame(usize),
}

/// Reply received in configuration mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationFrame {
    /// Prompt, the command was accepted
    Ack,
    /// Error text reported by the device
    Error(Vec<u8>),
}

/// Output coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// Radial beam coordinates, no transformation
    Beam,
    /// X/Y/Z relative to the instrument
    Instrument,
    /// X/Y/Z relative to the ship
    Ship,
    /// East/North/Up
    Earth,
}

impl CoordinateSystem {
    /// The two transformation digits of the `EX` command
    pub fn code(&self) -> [char; 2] {
        match self {
            CoordinateSystem::Beam => ['0', '0'],
            CoordinateSystem::Instrument => ['0', '1'],
            CoordinateSystem::Ship => ['1', '0'],
            CoordinateSystem::Earth => ['1', '1'],
        }
    }
}

/// Coordinate transformation settings sent with the `EX` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfiguration {
    pub coordinate_system: CoordinateSystem,
    pub use_attitude: bool,
    pub use_3beam_solution: bool,
    pub use_bin_mapping: bool,
}

/// Serial baud rates supported by the `CB` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaudRate {
    #[serde(rename = "300")]
    Baud300,
    #[serde(rename = "1200")]
    Baud1200,
    #[serde(rename = "2400")]
    Baud2400,
    #[serde(rename = "4800")]
    Baud4800,
    #[serde(rename = "9600")]
    Baud9600,
    #[serde(rename = "19200")]
    Baud19200,
    #[serde(rename = "38400")]
    Baud38400,
    #[serde(rename = "57600")]
    Baud57600,
    #[serde(rename = "115200")]
    Baud115200,
}

impl BaudRate {
    /// Digit used by the `CB` command
    pub fn code(&self) -> u8 {
        match self {
            BaudRate::Baud300 => 0,
            BaudRate::Baud1200 => 1,
            BaudRate::Baud2400 => 2,
            BaudRate::Baud4800 => 3,
            BaudRate::Baud9600 => 4,
            BaudRate::Baud19200 => 5,
            BaudRate::Baud38400 => 6,
            BaudRate::Baud57600 => 7,
            BaudRate::Baud115200 => 8,
        }
    }

    /// Bits per second
    pub fn bps(&self) -> u32 {
        match self {
            BaudRate::Baud300 => 300,
            BaudRate::Baud1200 => 1200,
            BaudRate::Baud2400 => 2400,
            BaudRate::Baud4800 => 4800,
            BaudRate::Baud9600 => 9600,
            BaudRate::Baud19200 => 19200,
            BaudRate::Baud38400 => 38400,
            BaudRate::Baud57600 => 57600,
            BaudRate::Baud115200 => 115200,
        }
    }

    pub fn from_bps(bps: u32) -> Result<Self> {
        match bps {
            300 => Ok(BaudRate::Baud300),
            1200 => Ok(BaudRate::Baud1200),
            2400 => Ok(BaudRate::Baud2400),
            4800 => Ok(BaudRate::Baud4800),
            9600 => Ok(BaudRate::Baud9600),
            19200 => Ok(BaudRate::Baud19200),
            38400 => Ok(BaudRate::Baud38400),
            57600 => Ok(BaudRate::Baud57600),
            115200 => Ok(BaudRate::Baud115200),
            _ => Err(DvlError::InvalidSetting(format!("unsupported baud rate {}", bps))),
        }
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        BaudRate::Baud9600
    }
}

/// Serial parity supported by the `CB` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Low,
    High,
}

impl Parity {
    /// Digit used by the `CB` command
    pub fn code(&self) -> u8 {
        match self {
            Parity::None => 1,
            Parity::Even => 2,
            Parity::Odd => 3,
            Parity::Low => 4,
            Parity::High => 5,
        }
    }
}

/// Where the device takes a measurement from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSource {
    /// Fixed, manually set value
    Manual,
    /// Internal sensor
    Internal,
    /// External sensor
    External,
}

impl SensorSource {
    /// Digit used by the `EZ` command
    pub fn code(&self) -> u8 {
        match self {
            SensorSource::Manual => 0,
            SensorSource::Internal => 1,
            SensorSource::External => 2,
        }
    }
}

/// Flags of the `CF` command, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowControl {
    /// Start the next ensemble as soon as the current one is sent
    pub automatic_ensemble_cycling: bool,
    /// Ping as soon as ready instead of waiting for `<Enter>`
    pub automatic_ping_cycling: bool,
    /// Binary output instead of hex-ASCII
    pub binary_data_output: bool,
    pub enable_serial_output: bool,
    pub enable_data_recording: bool,
}

impl Default for FlowControl {
    fn default() -> Self {
        FlowControl {
            automatic_ensemble_cycling: true,
            automatic_ping_cycling: true,
            binary_data_output: true,
            enable_serial_output: true,
            enable_data_recording: false,
        }
    }
}

/// Sources of the `EZ` command, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSources {
    /// `Internal` computes the speed of sound from depth, salinity and temperature
    pub speed_of_sound: SensorSource,
    pub depth: SensorSource,
    /// `Internal` is rejected by the device
    pub heading: SensorSource,
    pub pitch_and_roll: SensorSource,
    /// `Internal` is rejected by the device
    pub salinity: SensorSource,
    pub temperature: SensorSource,
}

impl Default for SensorSources {
    fn default() -> Self {
        SensorSources {
            speed_of_sound: SensorSource::External,
            depth: SensorSource::External,
            heading: SensorSource::External,
            pitch_and_roll: SensorSource::External,
            salinity: SensorSource::External,
            temperature: SensorSource::External,
        }
    }
}

/// Settings sent to the device by [`crate::Dvl::apply_config`].
///
/// `Default` holds the device's factory values. Ranges are those accepted by
/// the device; values outside them are reported back as device errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bottom-track pings averaged per ensemble, 0 to 999
    pub bottom_track_pings_per_ensemble: i32,
    /// Maximum bottom-track depth in metres, 1 to 6553.5
    pub maximum_tracking_depth: f64,
    pub flow_control: FlowControl,
    /// Misalignment between beam 3 and the heading reference, in degrees
    pub heading_alignment: f64,
    /// Electrical/magnetic heading bias in degrees (expert setting)
    pub heading_bias: f64,
    /// Parts per thousand, 0 to 40
    pub salinity: i32,
    pub transformation: CoordinateSystem,
    pub use_tilts_in_transformation: bool,
    pub allow_3beam_solutions: bool,
    pub allow_bin_mapping: bool,
    pub sensor_sources: SensorSources,
    /// Minimum interval between ensembles, up to 24:59:59.99
    pub time_per_ensemble: Duration,
    /// Minimum interval between pings, up to 59:59.99
    pub time_between_pings: Duration,
    /// 1 to 255
    pub number_of_depth_cells: i32,
    /// 0 to 16384
    pub pings_per_ensemble: i32,
    /// Depth cell height in metres, 0.1 to 8
    pub depth_cell_size: f64,
    pub baud_rate: BaudRate,
    pub parity: Parity,
    /// 1 or 2
    pub stop_bits: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bottom_track_pings_per_ensemble: 1,
            maximum_tracking_depth: 100.0,
            flow_control: FlowControl::default(),
            heading_alignment: 45.0,
            heading_bias: 0.0,
            salinity: 19,
            transformation: CoordinateSystem::Instrument,
            use_tilts_in_transformation: true,
            allow_3beam_solutions: true,
            allow_bin_mapping: false,
            sensor_sources: SensorSources::default(),
            time_per_ensemble: Duration::ZERO,
            time_between_pings: Duration::from_millis(200),
            number_of_depth_cells: 30,
            pings_per_ensemble: 0,
            depth_cell_size: 2.0,
            baud_rate: BaudRate::Baud9600,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The `EX` settings carried by this configuration
    pub fn output_configuration(&self) -> OutputConfiguration {
        OutputConfiguration {
            coordinate_system: self.transformation,
            use_attitude: self.use_tilts_in_transformation,
            use_3beam_solution: self.allow_3beam_solutions,
            use_bin_mapping: self.allow_bin_mapping,
        }
    }
}

/// Serial connection parameters parsed from `serial://<path>[:<baud>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialUri {
    pub path: String,
    pub baud_rate: u32,
}

impl SerialUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("serial://")
            .ok_or_else(|| DvlError::InvalidUri(format!("{} (expected serial://PATH[:BAUD])", uri)))?;

        let (path, baud_rate) = match rest.rsplit_once(':') {
            Some((path, baud)) => {
                let baud_rate = baud
                    .parse::<u32>()
                    .map_err(|_| DvlError::InvalidUri(format!("{} (invalid baud rate)", uri)))?;
                (path, baud_rate)
            }
            None => (rest, DEFAULT_BAUD_RATE),
        };

        if path.is_empty() {
            return Err(DvlError::InvalidUri(format!("{} (empty device path)", uri)));
        }

        Ok(SerialUri {
            path: path.to_string(),
            baud_rate,
        })
    }
}

/// One acquisition-mode frame handed back by [`crate::Dvl::read`]
#[derive(Debug, Clone)]
pub struct Ensemble<T> {
    /// Host time at which the frame was extracted
    pub received_at: DateTime<Utc>,
    pub data: T,
}

/// Reply returned by [`crate::Dvl::read`] for the mode that was active
#[derive(Debug, Clone)]
pub enum Reading<T> {
    Configuration(ConfigurationFrame),
    Ensemble(Ensemble<T>),
}

/// Shared stop flag for [`crate::Dvl::read_until`]
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How much of a configuration reached the device
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Every setting, including the port settings, was acknowledged and saved
    Committed,
    /// Everything but the port settings was saved. The port settings were
    /// sent but their acknowledgment or the final save failed, which is
    /// expected when they change the link parameters: reconnect with the new
    /// parameters and commit again.
    PortSettingsUnconfirmed(DvlError),
}

impl ApplyOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ApplyOutcome::Committed)
    }
}
