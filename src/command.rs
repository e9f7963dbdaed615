//! Command encoding for the configuration-mode interface.
//!
//! Most settings use the "standard" layout: a mnemonic, an optional sign and
//! a zero-padded fixed-width decimal field. The remaining commands each have
//! their own literal layout. Every function here is pure and returns the
//! complete command line including its terminator.

use std::time::Duration;

use crate::constants::*;
use crate::error::{DvlError, Result};
use crate::types::{BaudRate, FlowControl, OutputConfiguration, Parity, SensorSources};

/// A command of the form `MNEMONIC[±]DIGITS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardCommand {
    pub mnemonic: &'static str,
    pub value: i64,
    /// Number of digits of the numeric field
    pub width: usize,
    /// Whether the field carries an explicit `+`/`-`
    pub signed: bool,
}

impl StandardCommand {
    pub fn new(mnemonic: &'static str, value: i64, width: usize) -> Self {
        StandardCommand {
            mnemonic,
            value,
            width,
            signed: false,
        }
    }

    pub fn signed(mnemonic: &'static str, value: i64, width: usize) -> Self {
        StandardCommand {
            mnemonic,
            value,
            width,
            signed: true,
        }
    }

    /// Render the command line.
    ///
    /// Values whose magnitude needs more than `width` digits are rejected, as
    /// are negative values for unsigned fields.
    pub fn encode(&self) -> Result<String> {
        if !self.signed && self.value < 0 {
            return Err(DvlError::InvalidSetting(format!(
                "{} does not accept negative values ({})",
                self.mnemonic, self.value
            )));
        }

        let digits = self.value.unsigned_abs().to_string();
        if digits.len() > self.width {
            return Err(DvlError::FieldOverflow {
                mnemonic: self.mnemonic.to_string(),
                value: self.value,
                width: self.width,
            });
        }

        let mut command = String::with_capacity(self.mnemonic.len() + self.width + 2);
        command.push_str(self.mnemonic);
        if self.signed {
            command.push(if self.value < 0 { '-' } else { '+' });
        }
        for _ in digits.len()..self.width {
            command.push('0');
        }
        command.push_str(&digits);
        command.push(COMMAND_TERMINATOR);
        Ok(command)
    }
}

/// Scale a physical quantity to the device's integer unit, truncating toward zero
fn scaled(quantity: f64, factor: f64, what: &str) -> Result<i64> {
    if !quantity.is_finite() {
        return Err(DvlError::InvalidSetting(format!("{} is not a finite number", what)));
    }
    Ok((quantity * factor).trunc() as i64)
}

/// Degrees to hundredths of a degree
pub fn hundredths_of_degree(degrees: f64) -> Result<i64> {
    scaled(degrees, 100.0, "angle")
}

/// Metres to decimetres
pub fn decimeters(meters: f64) -> Result<i64> {
    scaled(meters, 10.0, "length")
}

/// Metres to centimetres
pub fn centimeters(meters: f64) -> Result<i64> {
    scaled(meters, 100.0, "length")
}

/// A command without arguments
pub fn plain(mnemonic: &str) -> String {
    format!("{}{}", mnemonic, COMMAND_TERMINATOR)
}

/// `BPnnn`
pub fn bottom_track_pings_per_ensemble(pings: i32) -> Result<String> {
    StandardCommand::new(CMD_BOTTOM_TRACK_PINGS, pings.into(), 3).encode()
}

/// `BXnnnnn`, depth in metres sent as decimetres
pub fn maximum_tracking_depth(meters: f64) -> Result<String> {
    StandardCommand::new(CMD_MAX_TRACKING_DEPTH, decimeters(meters)?, 5).encode()
}

/// `EA±nnnnn`
pub fn heading_alignment(degrees: f64) -> Result<String> {
    StandardCommand::signed(CMD_HEADING_ALIGNMENT, hundredths_of_degree(degrees)?, 5).encode()
}

/// `#EV±nnnnn`
pub fn heading_bias(degrees: f64) -> Result<String> {
    StandardCommand::signed(CMD_HEADING_BIAS, hundredths_of_degree(degrees)?, 5).encode()
}

/// `ESnn`
pub fn salinity(ppt: i32) -> Result<String> {
    StandardCommand::new(CMD_SALINITY, ppt.into(), 2).encode()
}

/// `WNnnn`
pub fn number_of_depth_cells(cells: i32) -> Result<String> {
    StandardCommand::new(CMD_DEPTH_CELLS, cells.into(), 3).encode()
}

/// `WPnnnnn`
pub fn pings_per_ensemble(pings: i32) -> Result<String> {
    StandardCommand::new(CMD_PINGS_PER_ENSEMBLE, pings.into(), 5).encode()
}

/// `WSnnnn`, size in metres sent as centimetres
pub fn depth_cell_size(meters: f64) -> Result<String> {
    StandardCommand::new(CMD_DEPTH_CELL_SIZE, centimeters(meters)?, 4).encode()
}

/// `CBbps`: baud code, parity code, stop bits
pub fn serial_port_control(baud_rate: BaudRate, parity: Parity, stop_bits: u8) -> Result<String> {
    if !(1..=2).contains(&stop_bits) {
        return Err(DvlError::InvalidSetting(format!(
            "stop bits must be 1 or 2, got {}",
            stop_bits
        )));
    }
    Ok(format!(
        "{}{}{}{}{}",
        CMD_SERIAL_PORT,
        baud_rate.code(),
        parity.code(),
        stop_bits,
        COMMAND_TERMINATOR
    ))
}

fn flag(value: bool) -> char {
    if value {
        '1'
    } else {
        '0'
    }
}

/// `CFfffff`
pub fn flow_control(flow: &FlowControl) -> String {
    let mut command = CMD_FLOW_CONTROL.to_string();
    for value in [
        flow.automatic_ensemble_cycling,
        flow.automatic_ping_cycling,
        flow.binary_data_output,
        flow.enable_serial_output,
        flow.enable_data_recording,
    ] {
        command.push(flag(value));
    }
    command.push(COMMAND_TERMINATOR);
    command
}

/// `EXccabm`: transformation pair, attitude, 3-beam solution, bin mapping
pub fn output_configuration(conf: &OutputConfiguration) -> String {
    let [high, low] = conf.coordinate_system.code();
    format!(
        "{}{}{}{}{}{}{}",
        CMD_COORDINATE_TRANSFORMATION,
        high,
        low,
        flag(conf.use_attitude),
        flag(conf.use_3beam_solution),
        flag(conf.use_bin_mapping),
        COMMAND_TERMINATOR
    )
}

/// `EZcdhprt`: speed of sound, depth, heading, pitch/roll, salinity, temperature
pub fn sensor_sources(sources: &SensorSources) -> String {
    format!(
        "{}{}{}{}{}{}{}{}",
        CMD_SENSOR_SOURCE,
        sources.speed_of_sound.code(),
        sources.depth.code(),
        sources.heading.code(),
        sources.pitch_and_roll.code(),
        sources.salinity.code(),
        sources.temperature.code(),
        COMMAND_TERMINATOR
    )
}

/// Split a duration into (hours, minutes, seconds, centiseconds).
///
/// Sub-centisecond precision is truncated.
pub fn split_time(time: Duration) -> Result<(u64, u64, u64, u64)> {
    let mut centiseconds = u64::try_from(time.as_micros() / 10_000)
        .map_err(|_| DvlError::InvalidSetting(format!("duration {:?} is out of range", time)))?;
    let hours = centiseconds / 360_000;
    centiseconds -= hours * 360_000;
    let minutes = centiseconds / 6_000;
    centiseconds -= minutes * 6_000;
    let seconds = centiseconds / 100;
    centiseconds -= seconds * 100;
    Ok((hours, minutes, seconds, centiseconds))
}

/// `TEhh:mm:ss.cc`
pub fn time_per_ensemble(time: Duration) -> Result<String> {
    let (hours, minutes, seconds, centiseconds) = split_time(time)?;
    if hours > 99 {
        return Err(DvlError::InvalidSetting(format!(
            "time per ensemble {:?} exceeds 99 hours",
            time
        )));
    }
    Ok(format!(
        "{}{:02}:{:02}:{:02}.{:02}{}",
        CMD_TIME_PER_ENSEMBLE, hours, minutes, seconds, centiseconds, COMMAND_TERMINATOR
    ))
}

/// `TPmm:ss.cc`
pub fn time_between_pings(time: Duration) -> Result<String> {
    let (hours, minutes, seconds, centiseconds) = split_time(time)?;
    let minutes = hours * 60 + minutes;
    if minutes > 99 {
        return Err(DvlError::InvalidSetting(format!(
            "time between pings {:?} exceeds 99 minutes",
            time
        )));
    }
    Ok(format!(
        "{}{:02}:{:02}.{:02}{}",
        CMD_TIME_BETWEEN_PINGS, minutes, seconds, centiseconds, COMMAND_TERMINATOR
    ))
}
