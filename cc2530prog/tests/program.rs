use std::cell::RefCell;
use std::rc::Rc;

use cc2530prog::flashing::{download, DownloadOptions, FirmwareImage, FlashError, FlashProgress, ProgressEvent};
use cc2530prog::probe::{FakeTarget, FakeTargetConfig, GpioError};
use cc2530prog::{Config, Error, IdMismatch, Session};
use pretty_assertions::assert_eq;

fn config() -> Config {
    Config {
        retries: 50,
        erase_poll_interval_us: 0,
        ..Config::default()
    }
}

fn open(target: &FakeTarget) -> Session<FakeTarget> {
    Session::open(target.clone(), &config()).unwrap()
}

/// A firmware image that doesn't look like erased flash anywhere.
fn firmware(len: usize) -> FirmwareImage {
    FirmwareImage::new((0..len).map(|i| (i * 7 + 3) as u8 & 0x7F).collect::<Vec<_>>())
}

fn verifying() -> DownloadOptions {
    DownloadOptions {
        verify: true,
        ..DownloadOptions::default()
    }
}

#[test]
fn downloads_and_verifies_two_blocks() {
    let target = FakeTarget::new(FakeTargetConfig {
        erase_busy_reads: 3,
        flash_busy_reads: 2,
        clock_settle_reads: 2,
        ..FakeTargetConfig::default()
    });
    let image = firmware(2048);
    let mut session = open(&target);

    let report = download(&mut session, &image, &verifying()).unwrap();
    session.close().unwrap();

    assert_eq!(report.chip.id, 0xA5);
    assert_eq!(report.program.blocks, 2);
    assert!(report.program.full_speed);
    assert_eq!(report.program.idle_blocks, 0);

    let verify = report.verify.unwrap();
    assert_eq!(verify.compared, 2048);
    assert!(verify.mismatches.is_empty());

    let flash = target.flash();
    assert_eq!(&flash[..2048], image.data());
    assert!(flash[2048..].iter().all(|&b| b == 0xFF));

    let stats = target.stats();
    assert_eq!(stats.flash_writes, 2);
    assert_eq!(stats.overlapping_writes, 0);
    assert_eq!(stats.flash_writes_without_dma, 0);
    assert_eq!(stats.count("erase"), 1);
    assert_eq!(stats.count("burst_write"), 2);
}

#[test]
fn two_blocks_on_a_responsive_target() {
    let target = FakeTarget::default();
    let mut session = open(&target);

    let report = download(&mut session, &firmware(2048), &verifying()).unwrap();

    assert_eq!(report.chip.flash_capacity().unwrap(), 64 * 1024);
    assert_eq!(report.program.blocks, 2);
    assert!(report.program.full_speed);
    assert_eq!(report.program.idle_blocks, 1);

    let verify = report.verify.unwrap();
    assert_eq!(verify.compared, 2048);
    assert!(verify.mismatches.is_empty());
}

#[test]
fn a_gpio_failure_while_programming_releases_the_target() {
    // Calls a whole download makes, to place the failure inside the last burst.
    let clean = FakeTarget::default();
    let mut session = open(&clean);
    download(&mut session, &firmware(2048), &DownloadOptions::default()).unwrap();
    let calls = clean.stats().set_values;
    drop(session);

    let target = FakeTarget::new(FakeTargetConfig {
        fail_set_value: Some(calls - 5000),
        ..FakeTargetConfig::default()
    });
    let mut session = open(&target);

    let result = download(&mut session, &firmware(2048), &DownloadOptions::default());

    let Err(Error::Flash(FlashError::Program { block, source })) = result else {
        panic!("expected a programming failure, got {result:?}");
    };
    assert_eq!(block, 1);
    assert!(matches!(*source, Error::Gpio(GpioError::Backend(_))));

    session.close().unwrap();
    assert!(!target.in_debug_mode());
    assert!(target.exported_pins().is_empty());
}

#[test]
fn the_last_block_is_padded_with_erased_bytes() {
    let target = FakeTarget::default();
    let image = firmware(1500);
    let mut session = open(&target);

    let report = download(&mut session, &image, &verifying()).unwrap();

    assert_eq!(report.program.blocks, 2);
    assert_eq!(report.verify.unwrap().compared, 2048);
    assert_eq!(&target.flash()[..1500], image.data());
    assert!(target.flash()[1500..2048].iter().all(|&b| b == 0xFF));
}

#[test]
fn an_idle_flash_controller_is_counted_but_not_fatal() {
    let target = FakeTarget::default();
    let mut session = open(&target);

    let report = download(&mut session, &firmware(3 * 1024), &DownloadOptions::default()).unwrap();

    assert!(report.program.full_speed);
    assert_eq!(report.program.idle_blocks, 2);
    assert!(report.verify.is_none());
}

#[test]
fn images_that_dont_fit_are_rejected_before_erasing() {
    let target = FakeTarget::new(FakeTargetConfig::default().with_flash_size_code(1));
    let mut session = open(&target);

    let result = download(&mut session, &firmware(32 * 1024 + 1), &DownloadOptions::default());

    assert!(matches!(
        result,
        Err(Error::Flash(FlashError::ImageTooLarge {
            size: 32769,
            capacity: 32768
        }))
    ));
    assert_eq!(target.stats().count("erase"), 0);
}

#[test]
fn a_corrupted_byte_fails_verification() {
    let target = FakeTarget::new(FakeTargetConfig {
        corrupt_offsets: vec![1030],
        ..FakeTargetConfig::default()
    });
    let image = firmware(2048);
    let mut session = open(&target);

    let result = download(&mut session, &image, &verifying());

    let Err(Error::Flash(FlashError::Verify {
        compared,
        expected,
        mismatches,
    })) = result
    else {
        panic!("expected a verification failure, got {result:?}");
    };
    assert_eq!(compared, 2048);
    assert_eq!(expected, 2048);
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].offset, 1030);
    assert_eq!(mismatches[0].expected, image.data()[1030]);
    assert_eq!(mismatches[0].actual, image.data()[1030] ^ 0x01);
}

#[test]
fn verifies_across_banks() {
    let target = FakeTarget::new(FakeTargetConfig::default().with_flash_size_code(3));
    let image = firmware(40 * 1024);
    let mut session = open(&target);

    let report = download(&mut session, &image, &verifying()).unwrap();

    assert_eq!(report.verify.unwrap().compared, 40 * 1024);
    assert_eq!(&target.flash()[..40 * 1024], image.data());
}

#[test]
fn dma_enable_is_retried_after_reentering_debug_mode() {
    let target = FakeTarget::new(FakeTargetConfig {
        config_echo_failures: 2,
        ..FakeTargetConfig::default()
    });
    let mut session = open(&target);

    download(&mut session, &firmware(1024), &DownloadOptions::default()).unwrap();

    let stats = target.stats();
    assert_eq!(stats.count("write_config"), 3);
    assert_eq!(stats.debug_entries, 3);
}

#[test]
fn dma_enable_gives_up_after_three_attempts() {
    let target = FakeTarget::new(FakeTargetConfig {
        config_echo_failures: 3,
        ..FakeTargetConfig::default()
    });
    let mut session = open(&target);

    let result = download(&mut session, &firmware(1024), &DownloadOptions::default());

    assert!(matches!(
        result,
        Err(Error::ProtocolMismatch {
            written: 0x22,
            read: 0xDD
        })
    ));
    let stats = target.stats();
    assert_eq!(stats.count("write_config"), 3);
    assert_eq!(stats.count("erase"), 0);
}

#[test]
fn a_contended_bus_is_reported_after_every_attempt() {
    let target = FakeTarget::new(FakeTargetConfig {
        chip_id: 0xFF,
        ..FakeTargetConfig::default()
    });
    let mut session = open(&target);

    let result = download(&mut session, &firmware(16), &DownloadOptions::default());

    assert!(matches!(
        result,
        Err(Error::UnrecognizedChip {
            id: 0xFF,
            reason: IdMismatch::Contended
        })
    ));
    assert_eq!(target.stats().count("get_chip_id"), 3);
}

#[test]
fn an_unknown_flash_size_stops_the_download() {
    let target = FakeTarget::new(FakeTargetConfig {
        chip_info0: 0x70,
        ..FakeTargetConfig::default()
    });
    let mut session = open(&target);

    let result = download(&mut session, &firmware(16), &DownloadOptions::default());

    assert!(matches!(result, Err(Error::UnsupportedFlashSize { code: 7 })));
}

#[test]
fn a_clock_that_never_settles_is_reported() {
    let target = FakeTarget::new(FakeTargetConfig {
        clock_settle_reads: 1000,
        ..FakeTargetConfig::default()
    });
    let mut session = open(&target);

    let result = download(&mut session, &firmware(16), &DownloadOptions::default());

    assert!(matches!(
        result,
        Err(Error::Flash(FlashError::ClockNotStable(_)))
    ));
}

#[test]
fn an_erase_that_never_finishes_is_reported() {
    let target = FakeTarget::new(FakeTargetConfig {
        erase_busy_reads: 1000,
        ..FakeTargetConfig::default()
    });
    let mut session = open(&target);

    let result = download(&mut session, &firmware(16), &DownloadOptions::default());

    let Err(Error::Flash(FlashError::Erase(source))) = result else {
        panic!("expected an erase failure, got {result:?}");
    };
    assert!(matches!(
        *source,
        Error::Timeout {
            operation: "chip erase"
        }
    ));
}

#[test]
fn a_stuck_flash_controller_names_the_block() {
    let target = FakeTarget::new(FakeTargetConfig {
        flash_busy_reads: 1000,
        ..FakeTargetConfig::default()
    });
    let mut session = open(&target);

    let result = download(&mut session, &firmware(2048), &DownloadOptions::default());

    assert!(matches!(
        result,
        Err(Error::Flash(FlashError::Program { block: 1, .. }))
    ));
}

#[test]
fn progress_events_follow_the_stages() {
    let target = FakeTarget::default();
    let mut session = open(&target);

    let events = Rc::new(RefCell::new(Vec::new()));
    let recorded = events.clone();
    let options = DownloadOptions {
        verify: true,
        progress: FlashProgress::new(move |event| recorded.borrow_mut().push(event)),
    };

    download(&mut session, &firmware(1500), &options).unwrap();

    let events = events.borrow();
    assert!(matches!(events[0], ProgressEvent::Identified { .. }));
    assert!(matches!(
        events[1..],
        [
            ProgressEvent::StartedErasing,
            ProgressEvent::FinishedErasing,
            ProgressEvent::StartedProgramming { blocks: 2 },
            ProgressEvent::BlockProgrammed { index: 0, size: 1024 },
            ProgressEvent::BlockProgrammed { index: 1, size: 1024 },
            ProgressEvent::FinishedProgramming { full_speed: true },
            ProgressEvent::StartedVerifying { bytes: 2048 },
            ProgressEvent::BytesVerified { bytes: 1024 },
            ProgressEvent::BytesVerified { bytes: 1024 },
            ProgressEvent::FinishedVerifying {
                compared: 2048,
                mismatches: 0
            },
        ]
    ));
}
