//! Hand-off of the finished IVF stream to an external muxer

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::errors::CaptureError;

/// External programs that can repackage IVF into a playable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemuxTool {
    /// `mkvmerge -o <out> -w <in>`
    Mkvmerge,
    /// `ffmpeg -y -loglevel error -i <in> -c copy <out>`
    Ffmpeg,
}

impl RemuxTool {
    /// Whether the tool can read an IVF stream tagged `fourcc`.
    ///
    /// mkvmerge's IVF reader only knows VP8, VP9 and AV1.
    pub fn supports_fourcc(&self, fourcc: [u8; 4]) -> bool {
        match self {
            RemuxTool::Mkvmerge => matches!(&fourcc, b"VP80" | b"VP90" | b"AV01"),
            RemuxTool::Ffmpeg => true,
        }
    }

    pub fn default_program(&self) -> &'static str {
        match self {
            RemuxTool::Mkvmerge => "mkvmerge",
            RemuxTool::Ffmpeg => "ffmpeg",
        }
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        match self {
            RemuxTool::Mkvmerge => vec![
                "-o".into(),
                output.into(),
                "-w".into(),
                input.into(),
            ],
            RemuxTool::Ffmpeg => vec![
                "-y".into(),
                "-loglevel".into(),
                "error".into(),
                "-i".into(),
                input.into(),
                "-c".into(),
                "copy".into(),
                output.into(),
            ],
        }
    }
}

/// Runs the remux tool and disposes of the intermediate stream.
#[derive(Debug, Clone)]
pub struct Remuxer {
    tool: RemuxTool,
    program: PathBuf,
    keep_intermediate: bool,
}

impl Remuxer {
    pub fn new(tool: RemuxTool) -> Self {
        Self {
            tool,
            program: PathBuf::from(tool.default_program()),
            keep_intermediate: false,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn keep_intermediate(mut self, keep: bool) -> Self {
        self.keep_intermediate = keep;
        self
    }

    /// Command line as it will be run, for diagnostics
    pub fn command_line(&self, input: &Path, output: &Path) -> String {
        std::iter::once(self.program.as_os_str().to_os_string())
            .chain(self.tool.args(input, output))
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Repackage `input` into `output`.
    ///
    /// On failure the intermediate file is left in place for manual
    /// recovery. On success it is deleted unless asked to keep it; a failed
    /// delete is only logged.
    pub fn remux(&self, input: &Path, output: &Path) -> Result<(), CaptureError> {
        let command_line = self.command_line(input, output);
        log::debug!("Shelling out to create the final container: {}", command_line);

        let result = Command::new(&self.program)
            .args(self.tool.args(input, output))
            .output()
            .map_err(|e| {
                CaptureError::RemuxError(format!(
                    "Failed to launch {}, check that {} is installed: {}",
                    command_line,
                    self.tool.default_program(),
                    e
                ))
            })?;

        if !result.status.success() {
            return Err(CaptureError::RemuxError(format!(
                "{} exited with {}: {}",
                command_line,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        if !self.keep_intermediate {
            if let Err(e) = fs::remove_file(input) {
                log::warn!(
                    "Failed to remove temporary file {}: {}",
                    input.display(),
                    e
                );
            }
        }
        Ok(())
    }
}
