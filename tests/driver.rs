mod common;

use common::{pd0_frame, MockTransport};
use std::io::Write as _;
use teledyne_dvl::{
    ApplyOutcome, BaudRate, CancelToken, Config, ConfigurationFrame, Dvl, DvlError, OperatingMode,
    Pd0Framer, Reading,
};

fn dvl(mock: MockTransport) -> Dvl<MockTransport> {
    Dvl::new(mock, Pd0Framer)
}

const DEFAULT_SEQUENCE: [&str; 16] = [
    "BP001\n",
    "BX01000\n",
    "CF11110\n",
    "EA+04500\n",
    "ES19\n",
    "#EV+00000\n",
    "EX01110\n",
    "EZ222222\n",
    "TE00:00:00.00\n",
    "TP00:00.20\n",
    "WN030\n",
    "WP00000\n",
    "WS0200\n",
    "CK\n",
    "CB411\n",
    "CK\n",
];

#[test]
fn handshake_gives_up_after_twelve_probes() {
    let mut dvl = dvl(MockTransport::new());

    let err = dvl.set_configuration_mode().unwrap_err();

    assert!(matches!(err, DvlError::Timeout));
    assert_eq!(dvl.transport().breaks, 1);
    assert_eq!(dvl.transport().writes.len(), 12);
    assert!(dvl.transport().writes.iter().all(|w| w == b"\n"));
    assert_ne!(dvl.mode(), OperatingMode::Configuration);
}

#[test]
fn handshake_retries_until_prompt() {
    let mut mock = MockTransport::acking();
    mock.deaf_probes = 5;
    let mut dvl = dvl(mock);

    dvl.set_configuration_mode().unwrap();

    assert_eq!(dvl.mode(), OperatingMode::Configuration);
    assert_eq!(dvl.transport().writes.len(), 6);
}

#[test]
fn handshake_discards_stale_ensemble_bytes() {
    let mut mock = MockTransport::acking();
    mock.push_input(&pd0_frame(&[1, 2, 3])[..7]);
    let mut dvl = dvl(mock);

    dvl.set_configuration_mode().unwrap();
    dvl.set_salinity(35).unwrap();

    assert_eq!(dvl.transport().written_lines(), vec!["\n", "ES35\n"]);
}

#[test]
fn failed_break_is_fatal() {
    let mut mock = MockTransport::acking();
    mock.fail_break = true;
    let mut dvl = dvl(mock);

    assert!(matches!(dvl.set_configuration_mode(), Err(DvlError::Io(_))));
    assert!(dvl.transport().writes.is_empty());
}

#[test]
fn out_of_range_salinity_surfaces_device_error() {
    let mut dvl = dvl(MockTransport::acking().on("ES50\n", b"ERR E009: salinity out of range\n>"));

    match dvl.set_salinity(50) {
        Err(DvlError::Device(message)) => assert!(message.contains("E009")),
        other => panic!("expected a device error, got {:?}", other),
    }
    // The prompt closing the error text must not acknowledge the next command
    dvl.set_salinity(35).unwrap();
    assert!(matches!(
        dvl.read_configuration_ack(std::time::Duration::from_millis(100)),
        Err(DvlError::Timeout)
    ));
}

#[test]
fn apply_config_sends_settings_in_order() {
    let mut dvl = dvl(MockTransport::acking());

    let outcome = dvl.apply_config(&Config::default()).unwrap();

    assert!(outcome.is_committed());
    let lines = dvl.transport().written_lines();
    assert_eq!(lines[0], "\n");
    assert_eq!(&lines[1..], &DEFAULT_SEQUENCE[..]);
}

#[test]
fn apply_config_aborts_on_first_rejection() {
    let mut dvl = dvl(MockTransport::acking().on("ES19\n", b"ERR 009: out of range\n>"));

    let err = dvl.apply_config(&Config::default()).unwrap_err();

    match &err {
        DvlError::Setting { setting, source } => {
            assert_eq!(*setting, "salinity");
            assert!(matches!(source.as_ref(), DvlError::Device(m) if m.contains("009")));
        }
        other => panic!("unexpected error {:?}", other),
    }
    let lines = dvl.transport().written_lines();
    assert_eq!(lines.last().map(String::as_str), Some("ES19\n"));
    assert!(!lines.iter().any(|l| l == "CK\n"));
}

#[test]
fn apply_config_rejects_unencodable_settings_before_sending() {
    let mut dvl = dvl(MockTransport::acking());
    let config = Config {
        number_of_depth_cells: 1000,
        ..Config::default()
    };

    let err = dvl.apply_config(&config).unwrap_err();

    assert!(matches!(
        err,
        DvlError::Setting {
            setting: "number of depth cells",
            ..
        }
    ));
    assert!(dvl.transport().writes.is_empty());
}

#[test]
fn baud_change_tolerates_failed_second_commit() {
    // The second commit goes unanswered: the device already talks at the new rate
    let mut dvl = dvl(MockTransport::acking().on("CK\n", b">").on("CK\n", b""));
    let config = Config {
        baud_rate: BaudRate::Baud115200,
        ..Config::default()
    };

    let outcome = dvl.apply_config(&config).unwrap();

    match outcome {
        ApplyOutcome::PortSettingsUnconfirmed(err) => assert!(err.is_timeout()),
        ApplyOutcome::Committed => panic!("second commit should not be confirmed"),
    }
    let lines = dvl.transport().written_lines();
    assert_eq!(&lines[lines.len() - 3..], &["CK\n", "CB811\n", "CK\n"]);
}

#[test]
fn unacknowledged_port_settings_skip_second_commit() {
    let mut dvl = dvl(MockTransport::acking().on("CB811\n", b""));
    let config = Config {
        baud_rate: BaudRate::Baud115200,
        ..Config::default()
    };

    let outcome = dvl.apply_config(&config).unwrap();

    assert!(matches!(
        outcome,
        ApplyOutcome::PortSettingsUnconfirmed(DvlError::Setting {
            setting: "serial port control",
            ..
        })
    ));
    assert_eq!(
        dvl.transport().written_lines().last().map(String::as_str),
        Some("CB811\n")
    );
}

#[test]
fn rejected_port_settings_are_an_error() {
    let mut dvl = dvl(MockTransport::acking().on("CB811\n", b"ERR 010: invalid\n>"));
    let config = Config {
        baud_rate: BaudRate::Baud115200,
        ..Config::default()
    };

    assert!(matches!(
        dvl.apply_config(&config),
        Err(DvlError::Setting {
            setting: "serial port control",
            ..
        })
    ));
}

#[test]
fn baud_switch_survives_unanswered_port_settings() {
    let mut dvl = dvl(MockTransport::acking().on("CB811\n", b""));
    dvl.set_configuration_mode().unwrap();

    dvl.set_desired_baud_rate(BaudRate::Baud115200).unwrap();

    assert_eq!(dvl.transport().baud_rate, 115200);
    assert_eq!(dvl.transport().breaks, 2);
    assert_eq!(dvl.mode(), OperatingMode::Configuration);
    let lines = dvl.transport().written_lines();
    assert_eq!(&lines[lines.len() - 2..], &["CB811\n", "\n"]);
}

#[test]
fn baud_switch_to_current_rate_sends_nothing() {
    let mut dvl = dvl(MockTransport::acking());

    dvl.set_desired_baud_rate(BaudRate::Baud9600).unwrap();

    assert_eq!(dvl.transport().breaks, 1);
    assert_eq!(dvl.transport().written_lines(), vec!["\n"]);
    assert_eq!(dvl.mode(), OperatingMode::Configuration);
}

#[test]
fn rejected_baud_switch_keeps_local_rate() {
    let mut dvl = dvl(MockTransport::acking().on("CB611\n", b"ERR 010: invalid\n>"));

    assert!(matches!(
        dvl.set_desired_baud_rate(BaudRate::Baud38400),
        Err(DvlError::Device(_))
    ));
    assert_eq!(dvl.transport().baud_rate, 9600);
    assert_eq!(dvl.transport().breaks, 1);
}

#[test]
fn acquisition_starts_at_requested_rate() {
    let mut dvl = dvl(MockTransport::acking());

    dvl.start_acquisition_at(BaudRate::Baud115200).unwrap();

    assert_eq!(dvl.transport().baud_rate, 115200);
    assert_eq!(dvl.mode(), OperatingMode::Acquisition);
    assert_eq!(
        dvl.transport().written_lines(),
        vec!["\n", "CB811\n", "\n", "PD0\n", "CS\n"]
    );
}

#[test]
fn acquisition_delivers_ensembles_across_split_reads() {
    let mut dvl = dvl(MockTransport::acking());
    dvl.set_configuration_mode().unwrap();
    dvl.start_acquisition().unwrap();
    assert_eq!(dvl.mode(), OperatingMode::Acquisition);

    let first = pd0_frame(&[0x00, 0x00, 10, 20, 30]);
    let second = pd0_frame(&[0x00, 0x00, 40, 50]);
    dvl.transport_mut().push_input(b"\r\n>");
    dvl.transport_mut().push_input(&first);
    dvl.transport_mut().push_input(&second);

    let ensemble = dvl.read_ensemble().unwrap();
    assert_eq!(ensemble.data.bytes, first[..first.len() - 2]);
    match dvl.read().unwrap() {
        Reading::Ensemble(ensemble) => assert_eq!(ensemble.data.bytes, second[..second.len() - 2]),
        other => panic!("unexpected reading {:?}", other),
    }

    let lines = dvl.transport().written_lines();
    assert_eq!(&lines[lines.len() - 2..], &["PD0\n", "CS\n"]);
}

#[test]
fn read_until_stops_when_cancelled() {
    let mut dvl = dvl(MockTransport::acking());
    dvl.set_configuration_mode().unwrap();
    dvl.start_acquisition().unwrap();
    for seq in 0..3u8 {
        dvl.transport_mut().push_input(&pd0_frame(&[0x00, 0x00, seq]));
    }

    let token = CancelToken::new();
    let stop = token.clone();
    let mut seen = Vec::new();
    let count = dvl
        .read_until(&token, |ensemble| {
            seen.push(ensemble.data.bytes[10]);
            if seen.len() == 2 {
                stop.cancel();
            }
        })
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(seen, vec![0, 1]);
}

#[test]
fn stop_acquisition_breaks_back_into_configuration() {
    let mut dvl = dvl(MockTransport::acking());
    dvl.set_configuration_mode().unwrap();
    dvl.start_acquisition().unwrap();
    dvl.transport_mut().push_input(&pd0_frame(&[0x00, 0x00]));

    dvl.stop_acquisition().unwrap();

    assert_eq!(dvl.transport().breaks, 2);
    assert_eq!(dvl.mode(), OperatingMode::Configuration);
    assert!(matches!(
        dvl.start_acquisition(),
        Ok(())
    ));
}

#[test]
fn read_in_configuration_mode_returns_prompt() {
    let mut dvl = dvl(MockTransport::acking());
    dvl.set_configuration_mode().unwrap();
    dvl.transport_mut().push_input(b">");

    assert!(matches!(
        dvl.read().unwrap(),
        Reading::Configuration(ConfigurationFrame::Ack)
    ));
}

#[test]
fn configuration_file_stops_at_start_pinging() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "ES35\r\nWN030\nCS\nCK\n").unwrap();
    let mut dvl = dvl(MockTransport::acking());

    dvl.send_configuration_file(file.path()).unwrap();

    assert_eq!(dvl.transport().written_lines(), vec!["\n", "ES35\n", "WN030\n"]);
    assert_eq!(dvl.mode(), OperatingMode::Configuration);
}

#[test]
fn configuration_file_surfaces_rejected_line() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "ES35\nXX\nWN030\n").unwrap();
    let mut dvl = dvl(MockTransport::acking().on("XX\n", b"ERR 001: unknown command\n>"));

    assert!(matches!(
        dvl.send_configuration_file(file.path()),
        Err(DvlError::Device(_))
    ));
    assert_eq!(dvl.transport().written_lines().last().map(String::as_str), Some("XX\n"));
}
