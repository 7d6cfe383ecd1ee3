//! External transcoder seam.
//!
//! The cache service only needs one thing from the transcoder: render a
//! visualization of an input file into an output PNG and report whether the
//! process exited successfully. [`FfmpegTranscoder`] does this with ffmpeg's
//! `showwavespic` and `showspectrumpic` filters.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::types::{ImageSize, VisualKind};
use crate::{Error, Result};

/// One rendering invocation.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Source audio file
    pub input: PathBuf,
    /// Where the transcoder must write the PNG
    pub output: PathBuf,
    /// Which visualization to draw
    pub kind: VisualKind,
    /// Output dimensions
    pub size: ImageSize,
}

/// Result of a finished (or killed) transcoder process.
#[derive(Debug, Clone, Default)]
pub struct TranscodeOutcome {
    /// Process exited with status zero
    pub success: bool,
    /// Exit code, when the process exited normally
    pub exit_code: Option<i32>,
    /// True when the process was killed for exceeding its time limit
    pub timed_out: bool,
    /// Collected stderr, for logging only
    pub diagnostics: String,
}

impl TranscodeOutcome {
    /// Outcome of a process that exited with `code`.
    pub fn exited(code: i32, diagnostics: impl Into<String>) -> Self {
        Self {
            success: code == 0,
            exit_code: Some(code),
            timed_out: false,
            diagnostics: diagnostics.into(),
        }
    }
}

/// Something that can rasterize a visualization of an audio file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run one render job.
    ///
    /// `Err` means the transcoder could not be started at all; a process that
    /// ran and failed is reported through [`TranscodeOutcome::success`].
    async fn render(&self, job: &RenderJob) -> Result<TranscodeOutcome>;
}

/// ffmpeg-backed transcoder.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
    timeout: Option<Duration>,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    /// Use `program` as the ffmpeg executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executable name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Filter graph drawing `kind` at `size`.
    pub fn filter(kind: VisualKind, size: ImageSize) -> String {
        match kind {
            VisualKind::Waveform => format!(
                "aformat=channel_layouts=mono,showwavespic=s={}:colors=white",
                size
            ),
            VisualKind::Spectrogram => format!(
                "showspectrumpic=s={}:legend=0:color=magma:scale=log",
                size
            ),
        }
    }

    /// Full argument list for `job`.
    pub fn args(job: &RenderJob) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            job.input.to_string_lossy().into_owned(),
            "-filter_complex".into(),
            Self::filter(job.kind, job.size),
            "-frames:v".into(),
            "1".into(),
            "-update".into(),
            "1".into(),
            job.output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    #[instrument(skip(self, job), fields(kind = %job.kind, input = %job.input.display()))]
    async fn render(&self, job: &RenderJob) -> Result<TranscodeOutcome> {
        let args = Self::args(job);
        debug!(program = %self.program, ?args, "Spawning transcoder");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::TranscoderUnavailable {
                program: self.program.clone(),
                source,
            })?;

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => {
                    // dropping the future kills the child (kill_on_drop)
                    return Ok(TranscodeOutcome {
                        success: false,
                        exit_code: None,
                        timed_out: true,
                        diagnostics: format!("transcoder exceeded {:?}", limit),
                    });
                }
            },
            None => child.wait_with_output().await?,
        };

        let diagnostics = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(status = ?output.status, "Transcoder exited");

        Ok(TranscodeOutcome {
            success: output.status.success(),
            exit_code: output.status.code(),
            timed_out: false,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(kind: VisualKind) -> RenderJob {
        RenderJob {
            input: PathBuf::from("/music/a b.flac"),
            output: PathBuf::from("/cache/waveforms/.a.partial.png"),
            kind,
            size: ImageSize::new(800, 200),
        }
    }

    #[test]
    fn test_waveform_args() {
        let args = FfmpegTranscoder::args(&job(VisualKind::Waveform));
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "/music/a b.flac");
        assert!(args.contains(&"aformat=channel_layouts=mono,showwavespic=s=800x200:colors=white".to_string()));
        assert_eq!(args.last().unwrap(), "/cache/waveforms/.a.partial.png");
    }

    #[test]
    fn test_spectrogram_filter() {
        let filter = FfmpegTranscoder::filter(VisualKind::Spectrogram, ImageSize::new(1024, 256));
        assert!(filter.starts_with("showspectrumpic=s=1024x256"));
        assert!(filter.contains("legend=0"));
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let transcoder = FfmpegTranscoder::new("audiovis-no-such-transcoder-binary");
        let err = transcoder.render(&job(VisualKind::Waveform)).await.unwrap_err();
        assert!(matches!(err, Error::TranscoderUnavailable { .. }));
    }
}
