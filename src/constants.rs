//! Protocol constants for DVL communication.
//!
//! This module defines the command mnemonics, framing bytes, timing
//! parameters and serial defaults used by the ExplorerDVL command interface.

use std::time::Duration;

/// Prompt byte acknowledging a configuration command
pub const PROMPT: u8 = b'>';

/// First byte of an error reply
pub const ERROR_LEAD: u8 = b'E';

/// Literal prefix of every error reply
pub const ERROR_PREFIX: &[u8; 2] = b"ER";

/// Marker terminating an error reply (the prompt starts the next frame)
pub const ERROR_TERMINATOR: &[u8; 2] = b"\n>";

/// Line terminator of every command
pub const COMMAND_TERMINATOR: char = '\n';

/// Save current settings to non-volatile memory
pub const CMD_COMMIT: &str = "CK";

/// Select PD0 output format
pub const CMD_SELECT_PD0: &str = "PD0";

/// Start continuous ping cycling
pub const CMD_START_PINGING: &str = "CS";

/// Bottom-track pings per ensemble (3 digits)
pub const CMD_BOTTOM_TRACK_PINGS: &str = "BP";

/// Maximum tracking depth in decimetres (5 digits)
pub const CMD_MAX_TRACKING_DEPTH: &str = "BX";

/// Heading alignment in hundredths of a degree (signed, 5 digits)
pub const CMD_HEADING_ALIGNMENT: &str = "EA";

/// Heading bias in hundredths of a degree (expert, signed, 5 digits)
pub const CMD_HEADING_BIAS: &str = "#EV";

/// Salinity in parts per thousand (2 digits)
pub const CMD_SALINITY: &str = "ES";

/// Serial port control
pub const CMD_SERIAL_PORT: &str = "CB";

/// Flow control
pub const CMD_FLOW_CONTROL: &str = "CF";

/// Coordinate transformation
pub const CMD_COORDINATE_TRANSFORMATION: &str = "EX";

/// Sensor source
pub const CMD_SENSOR_SOURCE: &str = "EZ";

/// Time per ensemble
pub const CMD_TIME_PER_ENSEMBLE: &str = "TE";

/// Time between pings
pub const CMD_TIME_BETWEEN_PINGS: &str = "TP";

/// Number of depth cells (3 digits)
pub const CMD_DEPTH_CELLS: &str = "WN";

/// Pings per ensemble (5 digits)
pub const CMD_PINGS_PER_ENSEMBLE: &str = "WP";

/// Depth cell size in centimetres (4 digits)
pub const CMD_DEPTH_CELL_SIZE: &str = "WS";

/// Number of newline probes sent while waiting for the prompt after a break
pub const HANDSHAKE_ATTEMPTS: usize = 12;

/// Time to wait for the prompt after each probe
pub const HANDSHAKE_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Write timeout for the handshake probe
pub const HANDSHAKE_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Default time to wait for a command acknowledgment
pub const ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Default write timeout for commands
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default read timeout in acquisition mode
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Duration to hold the break condition
pub const BREAK_DURATION: Duration = Duration::from_millis(300);

/// Factory baud rate of the device
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Longest line accepted from a command file
pub const MAX_COMMAND_LINE: usize = 2000;

/// Initial capacity of the driver's read buffer
pub const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// PD0 header and data source identifier
pub const PD0_HEADER_ID: u8 = 0x7F;
