//! Apply Config Example
//!
//! Sends a complete configuration to the DVL and saves it to non-volatile
//! memory. Without a config file the factory defaults are applied.
//!
//! Usage:
//!   cargo run --example apply_config -- serial:///dev/ttyUSB0:9600
//!   cargo run --example apply_config -- serial:///dev/ttyUSB0:9600 dvl.json
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example apply_config -- serial:///dev/ttyUSB0

use inquire::Confirm;
use log::{info, warn};
use teledyne_dvl::{ApplyOutcome, Config, SerialDvl, Result};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(uri) = args.next() else {
        eprintln!("usage: apply_config serial://PATH/TO/DEVICE[:BAUDRATE] [CONFIG.json]");
        std::process::exit(1);
    };

    let config = match args.next() {
        Some(path) => Config::from_json_file(&path)?,
        None => Config::default(),
    };
    println!("{}", config.to_json_string()?);

    let proceed = Confirm::new("Apply this configuration?")
        .with_default(true)
        .prompt()
        .unwrap_or(false);
    if !proceed {
        return Ok(());
    }

    let mut dvl = SerialDvl::connect(&uri)?;
    dvl.set_configuration_mode()?;

    match dvl.apply_config(&config)? {
        ApplyOutcome::Committed => info!("Configuration saved"),
        ApplyOutcome::PortSettingsUnconfirmed(e) => {
            warn!("{}", e);
            warn!(
                "Reconnect at {} baud and commit again to save the port settings",
                config.baud_rate.bps()
            );
        }
    }

    Ok(())
}
