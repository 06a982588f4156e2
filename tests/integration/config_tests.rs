//! Config file round trips

use tempfile::TempDir;
use wiimote_hid::hid::{DataReportMode, LedPattern};
use wiimote_hid::Config;

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.writer.write_interval_ms = 25;
    config.shutdown.drain_delay_ms = 300;
    config.input.report_mode = DataReportMode::ButtonsAccelExt16;
    config.input.player_leds = LedPattern::new(true, false, false, true);
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.writer.write_interval_ms, 25);
    assert_eq!(loaded.shutdown.drain_delay_ms, 300);
    assert_eq!(loaded.input.report_mode, DataReportMode::ButtonsAccelExt16);
    assert_eq!(loaded.input.player_leds, LedPattern::new(true, false, false, true));
    assert_eq!(loaded.input.ir_mode(), None);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(loaded.hid.vendor_id, 0x057E);
    assert_eq!(loaded.writer.max_queue_depth, 64);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[writer]\nwrite_interval_ms = \"fast\"\n").unwrap();
    assert!(Config::load_from(&path).is_err());
}
