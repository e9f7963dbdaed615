use log::{debug, info, trace, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::command;
use crate::constants::*;
use crate::error::{DvlError, Result};
use crate::framing::{extract_frame, parse_configuration_frame, printable, EnsembleParser};
use crate::pd0::Pd0Framer;
use crate::transport::{SerialTransport, Transport};
use crate::types::*;

/// Bytes requested from the transport per read
const READ_CHUNK: usize = 4096;

/// Main DVL protocol interface.
///
/// Usage:
/// - open the link with [`SerialDvl::connect`] (or [`Dvl::new`] with any transport)
/// - enter configuration mode with [`Dvl::set_configuration_mode`]
/// - configure the device with [`Dvl::apply_config`],
///   [`Dvl::send_configuration_file`] or the individual setters
/// - start pinging with [`Dvl::start_acquisition`] and collect ensembles with
///   [`Dvl::read`] or [`Dvl::read_until`]
/// - stop pinging with [`Dvl::set_configuration_mode`]
pub struct Dvl<T: Transport, P: EnsembleParser = Pd0Framer> {
    transport: T,
    parser: P,
    mode: OperatingMode,
    buffer: Vec<u8>,
    read_timeout: Duration,
}

/// Driver over a local serial port with PD0 framing
pub type SerialDvl = Dvl<SerialTransport, Pd0Framer>;

impl SerialDvl {
    /// Open the serial link described by `serial://PATH[:BAUD]` without
    /// talking to the device
    pub fn connect(uri: &str) -> Result<Self> {
        Ok(Dvl::new(SerialTransport::open_uri(uri)?, Pd0Framer))
    }

    /// Open the link, force configuration mode and start acquisition
    pub fn open(uri: &str) -> Result<Self> {
        let mut dvl = Self::connect(uri)?;
        dvl.set_configuration_mode()?;
        dvl.start_acquisition()?;
        Ok(dvl)
    }

    /// Like [`SerialDvl::open`], switching the device and the link to `baud_rate`
    /// before acquisition starts
    pub fn open_with_baud_rate(uri: &str, baud_rate: BaudRate) -> Result<Self> {
        let mut dvl = Self::connect(uri)?;
        dvl.start_acquisition_at(baud_rate)?;
        Ok(dvl)
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        Ok(serialport::available_ports()?)
    }
}

impl<T: Transport, P: EnsembleParser> Dvl<T, P> {
    /// Wrap an already open transport.
    ///
    /// The device state is unknown at this point, so the first
    /// [`Dvl::set_configuration_mode`] always sends a break.
    pub fn new(transport: T, parser: P) -> Self {
        Dvl {
            transport,
            parser,
            mode: OperatingMode::Acquisition,
            buffer: Vec::with_capacity(READ_BUFFER_CAPACITY),
            read_timeout: READ_TIMEOUT,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Timeout used by [`Dvl::read`]
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<()> {
        debug!("TX {}", printable(bytes));
        self.transport.write(bytes, timeout)?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.buffer.clear();
        self.transport.clear_input()
    }

    /// Read until one complete frame for the current mode is buffered and
    /// return it, discarding bytes that cannot start a frame
    fn read_frame(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            match extract_frame(self.mode, &self.buffer, &self.parser) {
                Extraction::Frame(length) => {
                    let frame: Vec<u8> = self.buffer.drain(..length).collect();
                    debug!("RX {}", printable(&frame));
                    return Ok(frame);
                }
                Extraction::Malformed if !self.buffer.is_empty() => {
                    trace!("Discarding {:#04X} to resynchronize", self.buffer[0]);
                    self.buffer.drain(..1);
                    continue;
                }
                Extraction::Malformed | Extraction::Incomplete => {}
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DvlError::Timeout);
            }

            let filled = self.buffer.len();
            self.buffer.resize(filled + READ_CHUNK, 0);
            let result = self.transport.read_available(&mut self.buffer[filled..], remaining);
            let received = *result.as_ref().unwrap_or(&0);
            self.buffer.truncate(filled + received);
            result?;
        }
    }

    /// Consume one configuration reply, failing with the device's error text
    /// if it is not a prompt
    pub fn read_configuration_ack(&mut self, timeout: Duration) -> Result<()> {
        if self.mode != OperatingMode::Configuration {
            return Err(DvlError::NotInConfigurationMode);
        }

        let frame = self.read_frame(timeout)?;
        match parse_configuration_frame(&frame) {
            ConfigurationFrame::Ack => Ok(()),
            ConfigurationFrame::Error(message) => {
                // The prompt closing the error text belongs to this reply
                if self.buffer.starts_with(ERROR_TERMINATOR) {
                    self.buffer.drain(..ERROR_TERMINATOR.len());
                }
                Err(DvlError::Device(
                    String::from_utf8_lossy(&message)
                        .trim_end_matches('\r')
                        .to_string(),
                ))
            }
        }
    }

    /// Send one command and wait for its acknowledgment
    pub fn send_and_await_ack(&mut self, command: &[u8], timeout: Duration) -> Result<()> {
        if self.mode != OperatingMode::Configuration {
            return Err(DvlError::NotInConfigurationMode);
        }
        self.write(command, WRITE_TIMEOUT)?;
        self.read_configuration_ack(timeout)
    }

    /// Put the device in configuration mode, stopping acquisition if needed.
    ///
    /// After the break the device stays deaf for an unspecified time, so a
    /// newline is sent repeatedly until it answers with a prompt.
    pub fn set_configuration_mode(&mut self) -> Result<()> {
        if self.mode == OperatingMode::Configuration {
            return Ok(());
        }

        self.transport.send_break()?;
        self.mode = OperatingMode::Configuration;
        self.clear_input()?;

        for attempt in 1..=HANDSHAKE_ATTEMPTS {
            let probe = self
                .write(b"\n", HANDSHAKE_WRITE_TIMEOUT)
                .and_then(|()| self.read_configuration_ack(HANDSHAKE_PROBE_TIMEOUT));
            match probe {
                Ok(()) => {
                    self.clear_input()?;
                    info!("Configuration mode after {} probe(s)", attempt);
                    return Ok(());
                }
                Err(DvlError::Timeout) if attempt < HANDSHAKE_ATTEMPTS => {
                    trace!("No prompt after probe {}", attempt);
                }
                Err(e) => {
                    // Force a new break on the next attempt
                    self.mode = OperatingMode::Acquisition;
                    return Err(e);
                }
            }
        }

        self.mode = OperatingMode::Acquisition;
        Err(DvlError::Timeout)
    }

    /// Alias of [`Dvl::set_configuration_mode`]
    pub fn stop_acquisition(&mut self) -> Result<()> {
        self.set_configuration_mode()
    }

    /// Move the device and the local link to `baud_rate` (no parity, one stop bit).
    ///
    /// The new rate is not committed to non-volatile memory. The device is in
    /// configuration mode afterwards.
    pub fn set_desired_baud_rate(&mut self, baud_rate: BaudRate) -> Result<()> {
        if self.transport.baud_rate()? == baud_rate.bps() {
            return self.set_configuration_mode();
        }

        match self.set_serial_port_control_settings(baud_rate, Parity::None, 1) {
            Ok(()) => {}
            // The prompt may come back at the new rate and never be recognized
            Err(DvlError::Timeout) => debug!("No prompt after CB, assuming the rate changed"),
            Err(e) => return Err(e),
        }

        self.transport.set_baud_rate(baud_rate.bps())?;
        self.mode = OperatingMode::Acquisition;
        self.set_configuration_mode()
    }

    /// Select PD0 output and start pinging.
    ///
    /// `CS` is not acknowledged: once pinging starts the device answers with
    /// ensembles instead of a prompt.
    pub fn start_acquisition(&mut self) -> Result<()> {
        if self.mode != OperatingMode::Configuration {
            return Err(DvlError::NotInConfigurationMode);
        }

        self.send_and_await_ack(command::plain(CMD_SELECT_PD0).as_bytes(), ACK_TIMEOUT)?;
        self.write(command::plain(CMD_START_PINGING).as_bytes(), WRITE_TIMEOUT)?;
        self.mode = OperatingMode::Acquisition;
        info!("Acquisition started");
        Ok(())
    }

    /// Enter configuration mode, switch to `baud_rate` and start acquisition
    pub fn start_acquisition_at(&mut self, baud_rate: BaudRate) -> Result<()> {
        self.set_configuration_mode()?;
        self.set_desired_baud_rate(baud_rate)?;
        self.start_acquisition()
    }

    /// Read and extract one frame in whichever mode is active
    pub fn read(&mut self) -> Result<Reading<P::Ensemble>> {
        let frame = self.read_frame(self.read_timeout)?;
        match self.mode {
            OperatingMode::Configuration => Ok(Reading::Configuration(parse_configuration_frame(&frame))),
            OperatingMode::Acquisition => Ok(Reading::Ensemble(self.decode(&frame)?)),
        }
    }

    /// Read one ensemble; requires acquisition mode
    pub fn read_ensemble(&mut self) -> Result<Ensemble<P::Ensemble>> {
        if self.mode != OperatingMode::Acquisition {
            return Err(DvlError::NotInAcquisitionMode);
        }
        let frame = self.read_frame(self.read_timeout)?;
        self.decode(&frame)
    }

    fn decode(&mut self, frame: &[u8]) -> Result<Ensemble<P::Ensemble>> {
        Ok(Ensemble {
            received_at: chrono::Utc::now(),
            data: self.parser.decode(frame)?,
        })
    }

    /// Hand ensembles to `on_ensemble` until `cancel` is set.
    ///
    /// Read timeouts are logged and retried so that a quiet device does not
    /// end the loop. Returns the number of ensembles delivered.
    pub fn read_until<F>(&mut self, cancel: &CancelToken, mut on_ensemble: F) -> Result<usize>
    where
        F: FnMut(Ensemble<P::Ensemble>),
    {
        let mut count = 0;
        while !cancel.is_cancelled() {
            match self.read_ensemble() {
                Ok(ensemble) => {
                    on_ensemble(ensemble);
                    count += 1;
                }
                Err(DvlError::Timeout) => warn!("No ensemble within {:?}", self.read_timeout),
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    /// Enter configuration mode, send an encoded command and await its ack
    fn configure(&mut self, command: String) -> Result<()> {
        self.set_configuration_mode()?;
        self.send_and_await_ack(command.as_bytes(), ACK_TIMEOUT)
    }

    /// Send an arbitrary command line (terminator added) and await its ack
    pub fn send_command(&mut self, line: &str) -> Result<()> {
        self.configure(command::plain(line))
    }

    /// Send every line of a command file, stopping before a `CS` line.
    ///
    /// The device is in configuration mode afterwards; use
    /// [`Dvl::start_acquisition`] to start pinging.
    pub fn send_configuration_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.set_configuration_mode()?;

        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.len() > MAX_COMMAND_LINE {
                return Err(DvlError::InvalidSetting(format!(
                    "command file lines are limited to {} characters",
                    MAX_COMMAND_LINE
                )));
            }
            if line == CMD_START_PINGING {
                break;
            }
            info!("{}", line);
            self.send_command(line)?;
        }
        Ok(())
    }

    /// Save the current settings to non-volatile memory
    pub fn commit(&mut self) -> Result<()> {
        self.configure(command::plain(CMD_COMMIT))
    }

    /// Number of bottom-track pings averaged per ensemble
    pub fn set_bottom_track_pings_per_ensemble(&mut self, pings: i32) -> Result<()> {
        self.configure(command::bottom_track_pings_per_ensemble(pings)?)
    }

    /// Maximum tracking depth in metres
    pub fn set_maximum_tracking_depth(&mut self, meters: f64) -> Result<()> {
        self.configure(command::maximum_tracking_depth(meters)?)
    }

    /// Serial port settings of the device.
    ///
    /// Changing them will almost certainly break the current connection;
    /// reconnect with the new settings afterwards.
    pub fn set_serial_port_control_settings(
        &mut self,
        baud_rate: BaudRate,
        parity: Parity,
        stop_bits: u8,
    ) -> Result<()> {
        self.configure(command::serial_port_control(baud_rate, parity, stop_bits)?)
    }

    pub fn set_flow_control_settings(&mut self, flow: &FlowControl) -> Result<()> {
        self.configure(command::flow_control(flow))
    }

    /// Physical misalignment between beam 3 and the heading reference, in degrees
    pub fn set_heading_alignment(&mut self, degrees: f64) -> Result<()> {
        self.configure(command::heading_alignment(degrees)?)
    }

    /// Electrical/magnetic heading bias, in degrees
    pub fn set_heading_bias(&mut self, degrees: f64) -> Result<()> {
        self.configure(command::heading_bias(degrees)?)
    }

    /// Water salinity in parts per thousand
    pub fn set_salinity(&mut self, ppt: i32) -> Result<()> {
        self.configure(command::salinity(ppt)?)
    }

    pub fn set_output_configuration(&mut self, conf: &OutputConfiguration) -> Result<()> {
        self.configure(command::output_configuration(conf))
    }

    pub fn set_sensor_source_settings(&mut self, sources: &SensorSources) -> Result<()> {
        self.configure(command::sensor_sources(sources))
    }

    pub fn set_time_per_ensemble(&mut self, time: Duration) -> Result<()> {
        self.configure(command::time_per_ensemble(time)?)
    }

    pub fn set_time_between_pings(&mut self, time: Duration) -> Result<()> {
        self.configure(command::time_between_pings(time)?)
    }

    pub fn set_number_of_depth_cells(&mut self, cells: i32) -> Result<()> {
        self.configure(command::number_of_depth_cells(cells)?)
    }

    pub fn set_pings_per_ensemble(&mut self, pings: i32) -> Result<()> {
        self.configure(command::pings_per_ensemble(pings)?)
    }

    /// Depth cell height in metres
    pub fn set_depth_cell_size(&mut self, meters: f64) -> Result<()> {
        self.configure(command::depth_cell_size(meters)?)
    }

    /// Send every setting of `conf` and save them to non-volatile memory.
    ///
    /// All commands are encoded before anything is sent. Settings are sent in
    /// a fixed order and saved; the serial port settings go last, followed by
    /// a second save. A failure anywhere before that aborts with the name of
    /// the failing setting, leaving earlier settings applied. A timeout on the
    /// port settings or any failure of the second save is reported as
    /// [`ApplyOutcome::PortSettingsUnconfirmed`].
    pub fn apply_config(&mut self, conf: &Config) -> Result<ApplyOutcome> {
        let steps: [(&'static str, Result<String>); 13] = [
            (
                "bottom track pings per ensemble",
                command::bottom_track_pings_per_ensemble(conf.bottom_track_pings_per_ensemble),
            ),
            (
                "maximum tracking depth",
                command::maximum_tracking_depth(conf.maximum_tracking_depth),
            ),
            ("flow control", Ok(command::flow_control(&conf.flow_control))),
            ("heading alignment", command::heading_alignment(conf.heading_alignment)),
            ("salinity", command::salinity(conf.salinity)),
            ("heading bias", command::heading_bias(conf.heading_bias)),
            (
                "output configuration",
                Ok(command::output_configuration(&conf.output_configuration())),
            ),
            ("sensor sources", Ok(command::sensor_sources(&conf.sensor_sources))),
            ("time per ensemble", command::time_per_ensemble(conf.time_per_ensemble)),
            ("time between pings", command::time_between_pings(conf.time_between_pings)),
            (
                "number of depth cells",
                command::number_of_depth_cells(conf.number_of_depth_cells),
            ),
            ("pings per ensemble", command::pings_per_ensemble(conf.pings_per_ensemble)),
            ("depth cell size", command::depth_cell_size(conf.depth_cell_size)),
        ];
        let port_settings =
            command::serial_port_control(conf.baud_rate, conf.parity, conf.stop_bits)
                .map_err(|e| e.in_setting("serial port control"))?;

        let mut commands = Vec::with_capacity(steps.len());
        for (setting, command) in steps {
            commands.push((setting, command.map_err(|e| e.in_setting(setting))?));
        }

        for (setting, command) in commands {
            self.configure(command).map_err(|e| e.in_setting(setting))?;
        }

        // Save before touching the port settings, the link may not survive them
        self.commit().map_err(|e| e.in_setting("commit"))?;

        match self.configure(port_settings) {
            Ok(()) => {}
            Err(DvlError::Timeout) => {
                warn!("Serial port settings not acknowledged, the link parameters probably changed");
                return Ok(ApplyOutcome::PortSettingsUnconfirmed(
                    DvlError::Timeout.in_setting("serial port control"),
                ));
            }
            Err(e) => return Err(e.in_setting("serial port control")),
        }

        match self.commit() {
            Ok(()) => Ok(ApplyOutcome::Committed),
            Err(e) => {
                warn!("Second commit failed ({}); reconnect with the new port settings and commit again", e);
                Ok(ApplyOutcome::PortSettingsUnconfirmed(e.in_setting("commit")))
            }
        }
    }
}
