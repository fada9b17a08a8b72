//! Configuration management for virtcap
//!
//! Provides TOML loading, saving and validation for the hypervisor
//! connection, encoder cadence and output handling. Command-line options
//! override whatever is loaded here.

use crate::capture::{VirshSettings, DEFAULT_BUFFER_CAPACITY};
use crate::errors::CaptureError;
use crate::remux::RemuxTool;
use crate::session::SessionConfig;
use crate::types::Timebase;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtcapConfig {
    pub capture: CaptureSection,
    pub encoding: EncodingSection,
    pub output: OutputSection,
}

/// Hypervisor and screenshot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSection {
    /// libvirt connection URI
    pub connection_uri: String,
    /// Capture buffer size in bytes; every screenshot must fit
    pub buffer_capacity: usize,
    /// `virsh` executable
    pub virsh_path: String,
    /// Display head to capture
    pub screen: u32,
}

/// Encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingSection {
    pub timebase_num: u32,
    pub timebase_den: u32,
    pub keyframe_interval: u32,
    /// Request lossless coding from encoders that support it
    pub lossless: bool,
}

/// Intermediate file and remux settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Directory holding the intermediate IVF stream
    pub temp_dir: Option<PathBuf>,
    pub remux_tool: RemuxTool,
    /// Program override for the remux tool
    pub remux_path: Option<String>,
    /// Keep the IVF stream after a successful remux
    pub keep_intermediate: bool,
}

impl Default for VirtcapConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSection {
                connection_uri: "qemu:///system".to_string(),
                buffer_capacity: DEFAULT_BUFFER_CAPACITY,
                virsh_path: "virsh".to_string(),
                screen: 0,
            },
            encoding: EncodingSection {
                timebase_num: 1,
                timebase_den: 5,
                keyframe_interval: 10,
                lossless: false,
            },
            output: OutputSection {
                temp_dir: None,
                remux_tool: RemuxTool::Ffmpeg,
                remux_path: None,
                keep_intermediate: false,
            },
        }
    }
}

impl VirtcapConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CaptureError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: VirtcapConfig = toml::from_str(&contents).map_err(|e| {
            CaptureError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CaptureError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            CaptureError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("virtcap.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.capture.connection_uri.is_empty() {
            return Err("Connection URI must not be empty".to_string());
        }
        if self.capture.buffer_capacity == 0 {
            return Err("Capture buffer capacity must be non-zero".to_string());
        }
        if self.encoding.timebase_num == 0 || self.encoding.timebase_den == 0 {
            return Err("Timebase numerator and denominator must be non-zero".to_string());
        }
        if self.encoding.keyframe_interval == 0 {
            return Err("Keyframe interval must be at least 1".to_string());
        }
        Ok(())
    }

    /// Validate, and check that the remux tool can read streams tagged
    /// `fourcc`.
    pub fn validate_for_codec(&self, fourcc: [u8; 4]) -> Result<(), String> {
        self.validate()?;
        if !self.output.remux_tool.supports_fourcc(fourcc) {
            return Err(format!(
                "{} cannot remux {} streams; set output.remux_tool = \"ffmpeg\"",
                self.output.remux_tool.default_program(),
                String::from_utf8_lossy(&fourcc)
            ));
        }
        Ok(())
    }

    pub fn timebase(&self) -> Timebase {
        Timebase::new(self.encoding.timebase_num, self.encoding.timebase_den)
    }

    /// Intermediate stream location for `domain`
    pub fn container_path(&self, domain: &str) -> PathBuf {
        self.output
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("{}.ivf", domain))
    }

    pub fn session_config(&self, domain: &str) -> SessionConfig {
        SessionConfig {
            container_path: self.container_path(domain),
            buffer_capacity: self.capture.buffer_capacity,
            timebase: self.timebase(),
            keyframe_interval: self.encoding.keyframe_interval,
            lossless: self.encoding.lossless,
        }
    }

    pub fn virsh_settings(&self, domain: &str) -> VirshSettings {
        let mut settings = VirshSettings::new(self.capture.connection_uri.clone(), domain);
        settings.program = PathBuf::from(&self.capture.virsh_path);
        settings.screen = self.capture.screen;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = VirtcapConfig::default();
        assert_eq!(config.capture.connection_uri, "qemu:///system");
        assert_eq!(config.capture.buffer_capacity, 1024 * 768 * 3 * 10);
        assert_eq!(config.timebase(), Timebase::new(1, 5));
        assert_eq!(config.encoding.keyframe_interval, 10);
        assert!(!config.encoding.lossless);
        assert_eq!(config.output.remux_tool, RemuxTool::Ffmpeg);
    }

    #[test]
    fn test_config_validation() {
        let config = VirtcapConfig::default();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.capture.buffer_capacity = 0;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.encoding.timebase_den = 0;
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.encoding.keyframe_interval = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_default_remux_tool_reads_h264() {
        let config = VirtcapConfig::default();
        assert!(config.validate_for_codec(*b"H264").is_ok());

        let mut mkv = config;
        mkv.output.remux_tool = RemuxTool::Mkvmerge;
        let err = mkv.validate_for_codec(*b"H264").unwrap_err();
        assert!(err.contains("mkvmerge cannot remux H264"));
        assert!(mkv.validate_for_codec(*b"VP90").is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("virtcap.toml");

        let mut config = VirtcapConfig::default();
        config.capture.screen = 1;
        config.output.remux_tool = RemuxTool::Mkvmerge;
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = VirtcapConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.capture.screen, 1);
        assert_eq!(loaded.output.remux_tool, RemuxTool::Mkvmerge);
        assert_eq!(loaded.encoding.timebase_den, 5);
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&VirtcapConfig::default()).unwrap();
        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[encoding]"));
        assert!(toml_string.contains("[output]"));
        assert!(toml_string.contains("remux_tool = \"ffmpeg\""));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = VirtcapConfig::load_from_file("nonexistent_virtcap.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().encoding.keyframe_interval, 10);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "capture = 3").unwrap();
        assert!(matches!(
            VirtcapConfig::load_from_file(&path),
            Err(CaptureError::ConfigError(_))
        ));
    }

    #[test]
    fn test_container_path_uses_domain_name() {
        let mut config = VirtcapConfig::default();
        config.output.temp_dir = Some(PathBuf::from("/var/tmp"));
        assert_eq!(config.container_path("win10"), PathBuf::from("/var/tmp/win10.ivf"));
    }
}
