//! Read Ensembles Example
//!
//! Opens the DVL, starts PD0 acquisition and prints every ensemble until
//! Enter is pressed, then puts the device back into configuration mode.
//!
//! Usage:
//!   cargo run --example read_ensembles                                  # Interactive mode
//!   cargo run --example read_ensembles -- serial:///dev/ttyUSB0:9600    # Specify URI
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example read_ensembles

use inquire::Select;
use log::{error, info};
use std::thread;
use teledyne_dvl::{CancelToken, SerialDvl, Result};

/// Interactive serial port selection using inquire
fn select_uri() -> Result<String> {
    let ports = SerialDvl::list_ports()?;

    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }

    let port_names: Vec<String> = ports
        .iter()
        .map(|p| format!("{} - {:?}", p.port_name, p.port_type))
        .collect();

    let selection = Select::new("Select a serial port:", port_names)
        .prompt()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Selection cancelled: {}", e),
            )
        })?;

    let port_name = selection.split(" - ").next().unwrap_or_default();
    Ok(format!("serial://{}", port_name))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let uri = std::env::args()
        .nth(1)
        .map(Ok)
        .unwrap_or_else(select_uri)?;

    info!("Opening {}...", uri);
    let mut dvl = SerialDvl::open(&uri)?;

    let cancel = CancelToken::new();
    let stop = cancel.clone();
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        stop.cancel();
    });

    println!("Press Enter to stop acquisition and exit.");
    println!("Time                            Bytes  Data types");
    let result = dvl.read_until(&cancel, |ensemble| {
        println!(
            "{}  {:5}  {}",
            ensemble.received_at.format("%Y-%m-%d %H:%M:%S%.3f"),
            ensemble.data.bytes.len(),
            ensemble.data.data_type_count()
        );
    });

    match result {
        Ok(count) => info!("Received {} ensembles", count),
        Err(e) => error!("Acquisition failed: {}", e),
    }

    info!("Stopping data acquisition");
    dvl.set_configuration_mode()
}
