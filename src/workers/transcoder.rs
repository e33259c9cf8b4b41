use async_trait::async_trait;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::settings::TranscodeConfig;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("source file {0} does not exist")]
    SourceMissing(PathBuf),

    #[error("source file {0} is empty")]
    SourceEmpty(PathBuf),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("ffprobe failed: {0}")]
    Probe(String),

    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("ffmpeg did not finish within {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Encoding limits applied to every upload.
#[derive(Debug, Clone)]
pub struct TranscodeParams {
    pub max_long_edge: u32,
    pub max_short_edge: u32,
    pub max_fps: f64,
    pub crf: u8,
    pub preset: String,
    pub max_bitrate_kbps: u32,
}

impl Default for TranscodeParams {
    fn default() -> Self {
        Self {
            max_long_edge: 1920,
            max_short_edge: 1080,
            max_fps: 30.0,
            crf: 28,
            preset: "medium".to_string(),
            max_bitrate_kbps: 2500,
        }
    }
}

impl From<&TranscodeConfig> for TranscodeParams {
    fn from(cfg: &TranscodeConfig) -> Self {
        Self {
            max_long_edge: cfg.max_long_edge,
            max_short_edge: cfg.max_short_edge,
            max_fps: cfg.max_fps,
            crf: cfg.crf,
            preset: cfg.preset.clone(),
            max_bitrate_kbps: cfg.max_bitrate_kbps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputFormat {
    pub width: u32,
    pub height: u32,
    /// `None` keeps the source frame rate.
    pub fps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub final_local_path: PathBuf,
    pub original_size_bytes: u64,
    pub compressed_size_bytes: u64,
    pub used_original: bool,
    pub elapsed_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub output: Option<OutputFormat>,
}

impl CompressionResult {
    /// Result that keeps the source file as the final asset.
    pub fn original(source: &Path, size: u64, elapsed_seconds: f64, duration_seconds: Option<f64>) -> Self {
        Self {
            final_local_path: source.to_path_buf(),
            original_size_bytes: size,
            compressed_size_bytes: size,
            used_original: true,
            elapsed_seconds,
            duration_seconds,
            output: None,
        }
    }
}

/// External video transcoder.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// False when the binaries are missing or broken.
    async fn is_available(&self) -> bool;

    async fn transcode(
        &self,
        source: &Path,
        target: &Path,
        params: &TranscodeParams,
    ) -> Result<CompressionResult, TranscodeError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub duration_seconds: Option<f64>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

pub fn parse_probe_output(stdout: &[u8]) -> Result<SourceInfo, TranscodeError> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| TranscodeError::Probe(format!("unreadable ffprobe output: {e}")))?;

    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| TranscodeError::Probe("no video stream found".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(TranscodeError::Probe("missing video dimensions".to_string())),
    };

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_frame_rate));

    let duration_seconds = probe
        .format
        .and_then(|f| f.duration)
        .or(stream.duration)
        .and_then(|d| d.parse::<f64>().ok());

    Ok(SourceInfo {
        width,
        height,
        fps,
        duration_seconds,
    })
}

fn floor_even(v: u32) -> u32 {
    (v - v % 2).max(2)
}

/// Fit `width`x`height` inside the long/short edge limits without upscaling,
/// keeping the aspect ratio and rounding both sides down to even numbers.
pub fn compute_target_dimensions(width: u32, height: u32, max_long_edge: u32, max_short_edge: u32) -> (u32, u32) {
    let long = width.max(height) as f64;
    let short = width.min(height) as f64;

    let scale = (max_long_edge as f64 / long)
        .min(max_short_edge as f64 / short)
        .min(1.0);

    let scaled = |v: u32| ((v as f64 * scale + 1e-6).floor() as u32).min(v);
    let (mut w, mut h) = (floor_even(scaled(width)), floor_even(scaled(height)));

    // keep the limits even when they are odd themselves
    let (long_cap, short_cap) = (floor_even(max_long_edge), floor_even(max_short_edge));
    if w >= h {
        w = w.min(long_cap);
        h = h.min(short_cap);
    } else {
        h = h.min(long_cap);
        w = w.min(short_cap);
    }
    (w, h)
}

pub fn cap_frame_rate(source_fps: Option<f64>, max_fps: f64) -> Option<f64> {
    source_fps.filter(|fps| *fps > max_fps).map(|_| max_fps)
}

pub fn build_ffmpeg_args(source: &Path, target: &Path, format: &OutputFormat, params: &TranscodeParams) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("scale={}:{}", format.width, format.height),
    ];

    if let Some(fps) = format.fps {
        args.extend(["-r".to_string(), format!("{fps}")]);
    }

    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        params.preset.clone(),
        "-crf".to_string(),
        params.crf.to_string(),
        "-maxrate".to_string(),
        format!("{}k", params.max_bitrate_kbps),
        "-bufsize".to_string(),
        format!("{}k", params.max_bitrate_kbps * 2),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-y".to_string(),
        target.to_string_lossy().to_string(),
    ]);
    args
}

/// ffprobe/ffmpeg driven through `tokio::process`.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &TranscodeConfig) -> Self {
        let timeout = (cfg.timeout_secs > 0).then(|| Duration::from_secs(cfg.timeout_secs));
        Self::new(cfg.ffmpeg_path.clone(), cfg.ffprobe_path.clone(), timeout)
    }

    async fn binary_works(program: &str) -> bool {
        Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    pub async fn probe(&self, source: &Path) -> Result<SourceInfo, TranscodeError> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(source)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.ffprobe_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TranscodeError::Probe(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_probe_output(&output.stdout)
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<(), TranscodeError> {
        let child = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child)
                .await
                .map_err(|_| TranscodeError::Timeout(limit))?,
            None => child.await,
        }
        .map_err(|source| TranscodeError::Spawn {
            program: self.ffmpeg_path.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // the tail carries the actual failure reason
            let lines: Vec<&str> = stderr.lines().collect();
            return Err(TranscodeError::Failed {
                status: output.status.to_string(),
                stderr: lines[lines.len().saturating_sub(5)..].join("\n"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn is_available(&self) -> bool {
        Self::binary_works(&self.ffmpeg_path).await && Self::binary_works(&self.ffprobe_path).await
    }

    async fn transcode(
        &self,
        source: &Path,
        target: &Path,
        params: &TranscodeParams,
    ) -> Result<CompressionResult, TranscodeError> {
        let start = Instant::now();

        let original_size = match fs::metadata(source).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TranscodeError::SourceMissing(source.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        if original_size == 0 {
            return Err(TranscodeError::SourceEmpty(source.to_path_buf()));
        }

        let info = self.probe(source).await?;
        let (width, height) =
            compute_target_dimensions(info.width, info.height, params.max_long_edge, params.max_short_edge);
        let format = OutputFormat {
            width,
            height,
            fps: cap_frame_rate(info.fps, params.max_fps),
        };

        info!(
            source = %source.display(),
            input = %format!("{}x{}@{:.2}", info.width, info.height, info.fps.unwrap_or_default()),
            output = %format!("{}x{}", format.width, format.height),
            fps_cap = ?format.fps,
            "🎬 Transcoding video"
        );

        let args = build_ffmpeg_args(source, target, &format, params);
        debug!(args = ?args, "ffmpeg command");

        if let Err(e) = self.run_ffmpeg(&args).await {
            if let Err(rm) = fs::remove_file(target).await {
                if rm.kind() != io::ErrorKind::NotFound {
                    warn!(path = %target.display(), error = %rm, "Failed to remove partial transcode output");
                }
            }
            return Err(e);
        }

        let elapsed = start.elapsed().as_secs_f64();
        let compressed_size = match fs::metadata(target).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        if compressed_size == 0 {
            warn!(target = %target.display(), "Transcoder produced no output, keeping original");
            return Ok(CompressionResult::original(source, original_size, elapsed, info.duration_seconds));
        }
        if compressed_size >= original_size {
            info!(
                original_size,
                compressed_size, "Transcode did not shrink the file, keeping original"
            );
            return Ok(CompressionResult::original(source, original_size, elapsed, info.duration_seconds));
        }

        info!(
            original_size,
            compressed_size,
            elapsed_seconds = elapsed,
            "✅ Transcode finished"
        );

        Ok(CompressionResult {
            final_local_path: target.to_path_buf(),
            original_size_bytes: original_size,
            compressed_size_bytes: compressed_size,
            used_original: false,
            elapsed_seconds: elapsed,
            duration_seconds: info.duration_seconds,
            output: Some(format),
        })
    }
}
