//! Configuration management

use crate::hid::protocol::{
    DataReportMode, IrMode, LedPattern, PRODUCT_ID_WIIMOTE, PRODUCT_ID_WIIMOTE_PLUS,
    PRO_CONTROLLER_SUFFIX, VENDOR_ID_NINTENDO,
};
use crate::hid::writer::WriterConfig;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HID device identification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HidConfig {
    /// USB/Bluetooth vendor id
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    /// Product id of the original remote
    #[serde(default = "default_wiimote_product_id")]
    pub wiimote_product_id: u16,
    /// Product id shared by the Remote Plus and the Pro Controller
    #[serde(default = "default_wiimote_plus_product_id")]
    pub wiimote_plus_product_id: u16,
    /// Product string suffix identifying a Pro Controller
    #[serde(default = "default_pro_controller_suffix")]
    pub pro_controller_suffix: String,
}

fn default_vendor_id() -> u16 {
    VENDOR_ID_NINTENDO
}
fn default_wiimote_product_id() -> u16 {
    PRODUCT_ID_WIIMOTE
}
fn default_wiimote_plus_product_id() -> u16 {
    PRODUCT_ID_WIIMOTE_PLUS
}
fn default_pro_controller_suffix() -> String {
    PRO_CONTROLLER_SUFFIX.to_string()
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            wiimote_product_id: default_wiimote_product_id(),
            wiimote_plus_product_id: default_wiimote_plus_product_id(),
            pro_controller_suffix: default_pro_controller_suffix(),
        }
    }
}

/// Delays between the shutdown steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// After queueing rumble/LED off, before stopping the writer
    #[serde(default = "default_drain_delay")]
    pub drain_delay_ms: u64,
    /// After the writer stopped, before the direct writes
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// After the direct writes, before the registry is cleared
    #[serde(default = "default_final_delay")]
    pub final_delay_ms: u64,
    /// Longest wait for a handle held by a stuck writer during the direct writes
    #[serde(default = "default_direct_write_timeout")]
    pub direct_write_timeout_ms: u64,
}

fn default_drain_delay() -> u64 {
    200
}
fn default_settle_delay() -> u64 {
    200
}
fn default_final_delay() -> u64 {
    100
}
fn default_direct_write_timeout() -> u64 {
    100
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_delay_ms: default_drain_delay(),
            settle_delay_ms: default_settle_delay(),
            final_delay_ms: default_final_delay(),
            direct_write_timeout_ms: default_direct_write_timeout(),
        }
    }
}

impl ShutdownConfig {
    pub fn drain_delay(&self) -> Duration {
        Duration::from_millis(self.drain_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn final_delay(&self) -> Duration {
        Duration::from_millis(self.final_delay_ms)
    }

    pub fn direct_write_timeout(&self) -> Duration {
        Duration::from_millis(self.direct_write_timeout_ms)
    }

    /// All delays zero, for tests
    pub fn immediate() -> Self {
        Self {
            drain_delay_ms: 0,
            settle_delay_ms: 0,
            final_delay_ms: 0,
            direct_write_timeout_ms: default_direct_write_timeout(),
        }
    }
}

/// Client loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Poll period of the client loop
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Report mode applied to the primary remote once found
    #[serde(default = "default_report_mode")]
    pub report_mode: DataReportMode,
    /// Enable the IR camera when the report mode carries IR bytes; the camera
    /// format follows the report mode
    #[serde(default = "default_ir_camera")]
    pub ir_camera: bool,
    /// Player LEDs lit on the primary remote once found
    #[serde(default = "default_player_leds")]
    pub player_leds: LedPattern,
    /// Read the accelerometer calibration from the remote on connect
    #[serde(default = "default_read_calibration")]
    pub read_calibration: bool,
    /// Look for a MotionPlus on connect and activate it once seen
    #[serde(default)]
    pub motion_plus: bool,
}

fn default_tick_interval() -> u64 {
    16
}
fn default_report_mode() -> DataReportMode {
    DataReportMode::ButtonsAccelIr10Ext6
}
fn default_ir_camera() -> bool {
    true
}
fn default_player_leds() -> LedPattern {
    LedPattern::single(0)
}
fn default_read_calibration() -> bool {
    true
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            report_mode: default_report_mode(),
            ir_camera: default_ir_camera(),
            player_leds: default_player_leds(),
            read_calibration: default_read_calibration(),
            motion_plus: false,
        }
    }
}

impl InputConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// IR format to configure the camera with, if any
    pub fn ir_mode(&self) -> Option<IrMode> {
        self.ir_camera.then(|| self.report_mode.ir_mode()).flatten()
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hid: HidConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub input: InputConfig,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "wiimote-hid", "WiimoteHid")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Get the default configuration embedded in the binary
    pub fn default_config_str() -> &'static str {
        include_str!("../../config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hid.vendor_id, 0x057E);
        assert_eq!(config.hid.wiimote_product_id, 0x0306);
        assert_eq!(config.hid.wiimote_plus_product_id, 0x0330);
        assert_eq!(config.hid.pro_controller_suffix, "UC");
        assert_eq!(config.writer.write_interval_ms, 40);
        assert_eq!(config.shutdown.drain_delay_ms, 200);
        assert_eq!(config.shutdown.settle_delay_ms, 200);
        assert_eq!(config.shutdown.final_delay_ms, 100);
        assert_eq!(config.input.report_mode, DataReportMode::ButtonsAccelIr10Ext6);
        assert_eq!(config.input.ir_mode(), Some(IrMode::Basic));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.hid.vendor_id, config.hid.vendor_id);
        assert_eq!(parsed.input.ir_camera, config.input.ir_camera);
        assert_eq!(parsed.input.player_leds, config.input.player_leds);
    }

    #[test]
    fn test_embedded_default_matches() {
        let parsed: Config = toml::from_str(Config::default_config_str()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.hid.vendor_id, defaults.hid.vendor_id);
        assert_eq!(parsed.hid.wiimote_plus_product_id, defaults.hid.wiimote_plus_product_id);
        assert_eq!(parsed.writer.max_queue_depth, defaults.writer.max_queue_depth);
        assert_eq!(parsed.shutdown.final_delay_ms, defaults.shutdown.final_delay_ms);
        assert_eq!(parsed.input.report_mode, defaults.input.report_mode);
        assert_eq!(parsed.input.ir_camera, defaults.input.ir_camera);
        assert_eq!(parsed.input.player_leds, defaults.input.player_leds);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[writer]\nwrite_interval_ms = 25\n").unwrap();
        assert_eq!(parsed.writer.write_interval_ms, 25);
        assert_eq!(parsed.writer.join_timeout_ms, 1000);
        assert_eq!(parsed.hid.wiimote_product_id, 0x0306);
    }

    #[test]
    fn test_ir_mode_follows_report_mode() {
        let mut input = InputConfig {
            report_mode: DataReportMode::ButtonsAccelIr12,
            ..Default::default()
        };
        assert_eq!(input.ir_mode(), Some(IrMode::Extended));

        input.report_mode = DataReportMode::ButtonsAccelExt16;
        assert_eq!(input.ir_mode(), None);

        input.report_mode = DataReportMode::ButtonsAccelIr10Ext6;
        input.ir_camera = false;
        assert_eq!(input.ir_mode(), None);
    }
}
