use cc2530prog::probe::{FakeTarget, FakeTargetConfig, GpioError, ResetPolarity};
use cc2530prog::{chip, command, Config, Error, IdMismatch, Phase, Session};
use pretty_assertions::assert_eq;

fn config() -> Config {
    Config {
        retries: 10,
        ..Config::default()
    }
}

#[test]
fn opening_claims_the_lines_and_closing_releases_them() {
    let target = FakeTarget::default();

    let session = Session::open(target.clone(), &config()).unwrap();
    assert_eq!(session.phase(), Phase::Disconnected);
    assert_eq!(target.exported_pins(), [0, 1, 2]);

    session.close().unwrap();
    assert!(target.exported_pins().is_empty());
}

#[test]
fn a_failed_export_gives_back_the_lines_already_claimed() {
    let target = FakeTarget::new(FakeTargetConfig {
        fail_export: Some(2),
        ..FakeTargetConfig::default()
    });

    let result = Session::open(target.clone(), &config());

    assert!(matches!(result, Err(Error::Gpio(GpioError::Backend(_)))));
    assert!(target.exported_pins().is_empty());
}

#[test]
fn dropping_an_active_session_lets_the_target_run() {
    let target = FakeTarget::default();

    {
        let mut session = Session::open(target.clone(), &config()).unwrap();
        session.enter().unwrap();
        assert!(target.in_debug_mode());
    }

    assert!(!target.in_debug_mode());
    assert!(target.exported_pins().is_empty());
    assert_eq!(target.stats().resets, 1);
}

#[test]
fn commands_need_debug_mode() {
    let target = FakeTarget::default();
    let mut session = Session::open(target, &config()).unwrap();

    assert!(matches!(session.interface(), Err(Error::NotInDebugMode)));

    session.enter().unwrap();
    assert_eq!(session.phase(), Phase::Active);
    assert!(session.interface().is_ok());

    session.leave().unwrap();
    assert_eq!(session.phase(), Phase::Disconnected);
    assert!(matches!(session.interface(), Err(Error::NotInDebugMode)));
}

#[test]
fn reset_polarity_is_honoured() {
    let target = FakeTarget::new(FakeTargetConfig {
        reset_polarity: ResetPolarity::ActiveHigh,
        ..FakeTargetConfig::default()
    });
    let config = Config {
        reset_polarity: ResetPolarity::ActiveHigh,
        ..config()
    };

    let mut session = Session::open(target.clone(), &config).unwrap();
    session.enter().unwrap();

    let info = chip::identify(session.interface().unwrap()).unwrap();
    assert_eq!(info.id, chip::CC2530_ID);
    assert_eq!(target.stats().debug_entries, 1);
}

#[test]
fn identifies_the_chip() {
    let target = FakeTarget::new(FakeTargetConfig::default().with_flash_size_code(4));
    let mut session = Session::open(target.clone(), &config()).unwrap();
    session.enter().unwrap();

    let info = chip::identify(session.interface().unwrap()).unwrap();

    assert_eq!(info.revision, 0x24);
    assert_eq!(info.flash_size(), Some(chip::FlashSize::Kib256));
    assert!(!info.usb());
    assert_eq!(info.extended_address, [0x4B, 0x1D, 0x3C, 0x02, 0x00, 0x4B, 0x12]);
    assert_eq!(info.extended_address_string(), "12:4b:00:02:3c:1d:4b");
}

#[test]
fn a_wrong_chip_is_not_mistaken_for_contention() {
    let target = FakeTarget::new(FakeTargetConfig {
        chip_id: 0x8D,
        ..FakeTargetConfig::default()
    });
    let mut session = Session::open(target, &config()).unwrap();
    session.enter().unwrap();

    let result = chip::identify(session.interface().unwrap());

    assert!(matches!(
        result,
        Err(Error::UnrecognizedChip {
            id: 0x8D,
            reason: IdMismatch::WrongChip
        })
    ));
}

#[test]
fn a_silent_target_times_out_without_reading() {
    let target = FakeTarget::new(FakeTargetConfig {
        never_ready: true,
        ..FakeTargetConfig::default()
    });
    let mut session = Session::open(target.clone(), &config()).unwrap();
    session.enter().unwrap();

    let result = chip::identify(session.interface().unwrap());

    assert!(matches!(
        result,
        Err(Error::Timeout {
            operation: "get_chip_id"
        })
    ));
    let stats = target.stats();
    assert_eq!(stats.wait_clocks, 10 * 8);
    assert_eq!(stats.bits_read, 0);
}

#[test]
fn a_slow_target_is_waited_for() {
    let target = FakeTarget::new(FakeTargetConfig {
        ready_delay: 4,
        ..FakeTargetConfig::default()
    });
    let mut session = Session::open(target.clone(), &config()).unwrap();
    session.enter().unwrap();

    let (id, _) = session.interface().unwrap().chip_id().unwrap();

    assert_eq!(id, chip::CC2530_ID);
    assert_eq!(target.stats().wait_clocks, 4 * 8);
}

#[test]
fn commands_run_by_abbreviated_name() {
    let target = FakeTarget::default();
    let mut session = Session::open(target.clone(), &config()).unwrap();
    session.enter().unwrap();
    let interface = session.interface().unwrap();

    assert_eq!(interface.execute_named("get_c", &[]).unwrap(), [0xA5, 0x24]);
    assert_eq!(interface.execute_named("write", &[0x22]).unwrap(), [0x22]);
    assert_eq!(interface.execute_named("read_c", &[]).unwrap(), [0x22]);
    assert_eq!(
        target.stats().commands,
        ["get_chip_id", "write_config", "read_config"]
    );
}

#[test]
fn unknown_command_names_are_rejected() {
    let target = FakeTarget::default();
    let mut session = Session::open(target.clone(), &config()).unwrap();
    session.enter().unwrap();
    let interface = session.interface().unwrap();

    assert!(matches!(
        interface.execute_named("frobnicate", &[]),
        Err(Error::UnknownCommand(name)) if name == "frobnicate"
    ));
    assert!(matches!(
        interface.execute_named("", &[]),
        Err(Error::UnknownCommand(_))
    ));
    assert!(target.stats().commands.is_empty());
}

#[test]
fn injected_instructions_reach_xdata() {
    let target = FakeTarget::default();
    let mut session = Session::open(target.clone(), &config()).unwrap();
    session.enter().unwrap();
    let interface = session.interface().unwrap();

    interface.write_xdata_block(0x0100, &[1, 2, 3]).unwrap();
    assert_eq!(interface.read_xdata(0x0101).unwrap(), 2);
    assert_eq!(target.xdata(0x0102), 3);

    let status = interface.execute(&command::READ_STATUS, &[]).unwrap();
    assert_eq!(status.len(), 1);
}
