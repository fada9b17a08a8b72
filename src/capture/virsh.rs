//! libvirt screenshots through the `virsh` command-line client

use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use super::{read_into, ScreenshotSource};
use crate::errors::CaptureError;

/// Where and how to reach the domain.
#[derive(Debug, Clone)]
pub struct VirshSettings {
    /// `virsh` executable
    pub program: PathBuf,
    pub connection_uri: String,
    pub domain: String,
    /// Head of the domain's display to grab
    pub screen: u32,
    /// File `virsh screenshot` writes into before it is copied to the buffer
    pub scratch_path: PathBuf,
}

impl VirshSettings {
    pub fn new(connection_uri: impl Into<String>, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let scratch_path =
            std::env::temp_dir().join(format!("virtcap-{}-{}.ppm", domain, std::process::id()));
        Self {
            program: PathBuf::from("virsh"),
            connection_uri: connection_uri.into(),
            domain,
            screen: 0,
            scratch_path,
        }
    }
}

/// Screenshot source backed by `virsh screenshot`.
pub struct VirshSource {
    settings: VirshSettings,
}

impl VirshSource {
    /// Check that the domain exists and is running.
    pub fn connect(settings: VirshSettings) -> Result<Self, CaptureError> {
        let source = Self { settings };
        let output = source.run(&["domstate", "--domain", &source.settings.domain])?;
        if !output.status.success() {
            return Err(CaptureError::SourceError(format!(
                "Could not find domain {} on {}: {}",
                source.settings.domain,
                source.settings.connection_uri,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if state != "running" {
            return Err(CaptureError::SourceError(format!(
                "Domain must be running (domain {} is {})",
                source.settings.domain, state
            )));
        }

        log::info!(
            "Connected to domain {} via {}",
            source.settings.domain,
            source.settings.connection_uri
        );
        Ok(source)
    }

    pub fn settings(&self) -> &VirshSettings {
        &self.settings
    }

    fn run(&self, args: &[&str]) -> Result<Output, CaptureError> {
        Command::new(&self.settings.program)
            .arg("--connect")
            .arg(&self.settings.connection_uri)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                CaptureError::SourceError(format!(
                    "Failed to execute {}: {}",
                    self.settings.program.display(),
                    e
                ))
            })
    }
}

impl ScreenshotSource for VirshSource {
    fn capture(&mut self, buf: &mut [u8]) -> Result<Option<usize>, CaptureError> {
        let screen = self.settings.screen.to_string();
        let scratch = self.settings.scratch_path.to_string_lossy().to_string();
        let output = self.run(&[
            "screenshot",
            "--domain",
            &self.settings.domain,
            "--file",
            &scratch,
            "--screen",
            &screen,
        ])?;

        if !output.status.success() {
            log::debug!(
                "Screenshot failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let mut file = match File::open(&self.settings.scratch_path) {
            Ok(file) => file,
            Err(e) => {
                log::debug!("Screenshot produced no file: {}", e);
                return Ok(None);
            }
        };
        let len = read_into(&mut file, buf)?;
        drop(file);
        let _ = fs::remove_file(&self.settings.scratch_path);

        if len == 0 {
            return Ok(None);
        }
        log::debug!("Captured {} byte screenshot", len);
        Ok(Some(len))
    }
}

impl Drop for VirshSource {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.settings.scratch_path);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    /// Write an executable shell script standing in for `virsh`.
    fn fake_virsh(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("virsh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn settings(dir: &std::path::Path, program: PathBuf) -> VirshSettings {
        let mut settings = VirshSettings::new("test:///default", "guest");
        settings.program = program;
        settings.scratch_path = dir.join("shot.ppm");
        settings
    }

    #[test]
    fn test_connect_requires_running_domain() {
        let dir = tempdir().unwrap();
        let program = fake_virsh(dir.path(), "echo 'shut off'");
        let result = VirshSource::connect(settings(dir.path(), program));
        assert!(matches!(
            result,
            Err(CaptureError::SourceError(msg)) if msg.contains("must be running")
        ));
    }

    #[test]
    fn test_connect_unknown_domain() {
        let dir = tempdir().unwrap();
        let program = fake_virsh(dir.path(), "echo 'error: failed to get domain' >&2; exit 1");
        assert!(VirshSource::connect(settings(dir.path(), program)).is_err());
    }

    #[test]
    fn test_missing_program_is_fatal() {
        let dir = tempdir().unwrap();
        let result = VirshSource::connect(settings(dir.path(), dir.path().join("missing")));
        assert!(matches!(result, Err(CaptureError::SourceError(_))));
    }

    #[test]
    fn test_capture_copies_screenshot_file() {
        let dir = tempdir().unwrap();
        // domstate prints "running"; screenshot writes a 1x1 PPM to --file
        let program = fake_virsh(
            dir.path(),
            r#"case "$3" in
  domstate) echo running ;;
  screenshot) printf 'P6\n1 1\n255\n\377\000\000' > "$7" ;;
esac"#,
        );
        let mut source = VirshSource::connect(settings(dir.path(), program)).unwrap();
        let mut buf = [0u8; 64];
        let len = source.capture(&mut buf).unwrap().expect("capture");
        assert_eq!(&buf[..len], b"P6\n1 1\n255\n\xff\x00\x00");
        assert!(!dir.path().join("shot.ppm").exists());
    }

    #[test]
    fn test_failed_screenshot_is_transient() {
        let dir = tempdir().unwrap();
        let program = fake_virsh(
            dir.path(),
            r#"case "$3" in
  domstate) echo running ;;
  *) exit 1 ;;
esac"#,
        );
        let mut source = VirshSource::connect(settings(dir.path(), program)).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(source.capture(&mut buf).unwrap(), None);
    }
}
