use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::frame::Roi;
use crate::Channel;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_FRAME_RATE: u32 = 60;
const DEFAULT_THRESHOLD: u8 = 228;
const DEFAULT_RED_PORT: u16 = 1;
const DEFAULT_GREEN_PORT: u16 = 2;
const DEFAULT_BLUE_PORT: u16 = 3;

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    host: Option<String>,
    device: Option<String>,
    pixel_coords: Option<bool>,
    frame_rate: Option<u32>,
    resolution: Option<[u32; 2]>,
    roi: Option<Roi>,
    red: Option<ChannelConfigFile>,
    green: Option<ChannelConfigFile>,
    blue: Option<ChannelConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ChannelConfigFile {
    enabled: Option<bool>,
    threshold: Option<u8>,
    port: Option<u16>,
}

/// Validated tracker configuration, immutable for the session's lifetime.
///
/// Built by merging defaults, an optional JSON config file, environment
/// overrides (`LED_TRACKER_*`) and CLI flags, then `validate()`d once
/// before the session starts. A `None` channel is untracked; the per-
/// channel fields are explicit so two channels can never silently share a
/// port the way a duplicate dict key would allow.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub host: String,
    pub device: String,
    pub pixel_coords: bool,
    pub frame_rate: u32,
    pub resolution: Option<(u32, u32)>,
    pub roi: Option<Roi>,
    pub red: Option<ChannelSettings>,
    pub green: Option<ChannelSettings>,
    pub blue: Option<ChannelSettings>,
}

/// Threshold and dispatch endpoint for one tracked channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSettings {
    /// Intensities strictly greater than this are "on" (0-255).
    pub threshold: u8,
    /// UDP port this channel's positions are sent to.
    pub port: u16,
}

impl TrackerConfig {
    /// Load configuration from an optional JSON file (falling back to the
    /// `LED_TRACKER_CONFIG` path) and apply environment overrides.
    ///
    /// The result is not yet validated: the caller applies its own
    /// overrides (CLI flags) and then calls `validate()` before use.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(PathBuf::from)
            .or_else(|| std::env::var("LED_TRACKER_CONFIG").ok().map(PathBuf::from));
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => TrackerConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: TrackerConfigFile) -> Self {
        Self {
            host: file.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            device: file.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            pixel_coords: file.pixel_coords.unwrap_or(false),
            frame_rate: file.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
            resolution: file.resolution.map(|[w, h]| (w, h)),
            roi: file.roi,
            red: channel_from_file(file.red, DEFAULT_RED_PORT),
            green: channel_from_file(file.green, DEFAULT_GREEN_PORT),
            blue: channel_from_file(file.blue, DEFAULT_BLUE_PORT),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("LED_TRACKER_HOST") {
            if !host.trim().is_empty() {
                self.host = host;
            }
        }
        if let Ok(device) = std::env::var("LED_TRACKER_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device;
            }
        }
        if let Ok(rate) = std::env::var("LED_TRACKER_FRAME_RATE") {
            let rate: u32 = rate
                .parse()
                .map_err(|_| anyhow!("LED_TRACKER_FRAME_RATE must be an integer"))?;
            self.frame_rate = rate;
        }
        Ok(())
    }

    /// Check every setup-time invariant. Any failure here is fatal to
    /// session start; no frame is processed with a partially valid
    /// configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tracked_channels().is_empty() {
            return Err(anyhow!("at least one channel must be tracked"));
        }

        let endpoints = self.endpoints();
        for (i, &(channel, port)) in endpoints.iter().enumerate() {
            if let Some(&(other, _)) = endpoints[..i].iter().find(|&&(_, p)| p == port) {
                return Err(anyhow!(
                    "channels '{}' and '{}' are both bound to port {}",
                    other.tag(),
                    channel.tag(),
                    port
                ));
            }
        }

        if let Some(roi) = &self.roi {
            roi.validate_shape()?;
        }

        if self.frame_rate == 0 {
            return Err(anyhow!("frame rate must be greater than zero"));
        }
        if let Some((width, height)) = self.resolution {
            if width == 0 || height == 0 {
                return Err(anyhow!("resolution must be non-zero, got {}x{}", width, height));
            }
        }
        Ok(())
    }

    /// Settings for one channel, `None` when it is not tracked.
    pub fn channel(&self, channel: Channel) -> Option<ChannelSettings> {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut Option<ChannelSettings> {
        match channel {
            Channel::Red => &mut self.red,
            Channel::Green => &mut self.green,
            Channel::Blue => &mut self.blue,
        }
    }

    /// Tracked channels with their thresholds, in processing order.
    pub fn tracked_channels(&self) -> Vec<(Channel, u8)> {
        Channel::ALL
            .iter()
            .filter_map(|&c| self.channel(c).map(|s| (c, s.threshold)))
            .collect()
    }

    /// Per-channel dispatch endpoints, in processing order.
    pub fn endpoints(&self) -> Vec<(Channel, u16)> {
        Channel::ALL
            .iter()
            .filter_map(|&c| self.channel(c).map(|s| (c, s.port)))
            .collect()
    }
}

fn channel_from_file(file: Option<ChannelConfigFile>, default_port: u16) -> Option<ChannelSettings> {
    let file = file.unwrap_or_default();
    if !file.enabled.unwrap_or(true) {
        return None;
    }
    Some(ChannelSettings {
        threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
        port: file.port.unwrap_or(default_port),
    })
}

fn read_config_file(path: &Path) -> Result<TrackerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_track_all_channels() {
        let cfg = TrackerConfig::from_file(TrackerConfigFile::default());
        cfg.validate().unwrap();

        assert_eq!(cfg.host, "localhost");
        assert!(!cfg.pixel_coords);
        assert_eq!(cfg.frame_rate, 60);
        assert_eq!(cfg.tracked_channels().len(), 3);
        assert_eq!(
            cfg.endpoints(),
            vec![
                (Channel::Red, 1),
                (Channel::Green, 2),
                (Channel::Blue, 3)
            ]
        );
    }

    #[test]
    fn file_settings_override_defaults() {
        let file = write_config(
            r#"{
                "host": "192.168.1.5",
                "pixel_coords": true,
                "frame_rate": 30,
                "resolution": [640, 480],
                "roi": {"top": 20, "left": 20, "bottom": 30, "right": 30},
                "red": {"threshold": 200, "port": 9001},
                "green": {"enabled": false},
                "blue": {"port": 9003}
            }"#,
        );
        let cfg = TrackerConfig::load(Some(file.path())).unwrap();
        cfg.validate().unwrap();

        assert_eq!(cfg.host, "192.168.1.5");
        assert!(cfg.pixel_coords);
        assert_eq!(cfg.frame_rate, 30);
        assert_eq!(cfg.resolution, Some((640, 480)));
        assert_eq!(cfg.roi, Some(Roi::new(20, 20, 30, 30)));
        assert_eq!(
            cfg.tracked_channels(),
            vec![(Channel::Red, 200), (Channel::Blue, 228)]
        );
        assert_eq!(
            cfg.endpoints(),
            vec![(Channel::Red, 9001), (Channel::Blue, 9003)]
        );
    }

    #[test]
    fn duplicate_ports_are_rejected() {
        let file = write_config(r#"{"red": {"port": 9000}, "green": {"port": 9000}}"#);
        let cfg = TrackerConfig::load(Some(file.path())).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("port 9000"), "{}", err);
    }

    #[test]
    fn all_channels_disabled_is_rejected() {
        let file = write_config(
            r#"{
                "red": {"enabled": false},
                "green": {"enabled": false},
                "blue": {"enabled": false}
            }"#,
        );
        let cfg = TrackerConfig::load(Some(file.path())).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_roi_is_rejected() {
        let file =
            write_config(r#"{"roi": {"top": 30, "left": 20, "bottom": 30, "right": 40}}"#);
        let cfg = TrackerConfig::load(Some(file.path())).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_threshold_is_rejected_by_parsing() {
        let file = write_config(r#"{"red": {"threshold": 300}}"#);
        assert!(TrackerConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn zero_frame_rate_is_rejected() {
        let file = write_config(r#"{"frame_rate": 0}"#);
        let cfg = TrackerConfig::load(Some(file.path())).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(TrackerConfig::load(Some(Path::new("/nonexistent/tracker.json"))).is_err());
    }
}
