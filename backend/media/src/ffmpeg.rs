//! Decode backend that shells out to `ffprobe` and `ffmpeg`.
//!
//! Each extraction runs as a background task that pipes one raw RGBA frame
//! back over a channel. A seek aborts the running extraction and starts a new
//! one; results from aborted extractions are discarded by generation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use image::RgbaImage;
use thumbforge_config::ThumbforgeConfig;
use thumbforge_core::{DecodeBackend, DecodeEvent, DecodeSession, Dimensions, PlaybackState};
use thumbforge_logging::redact_stream_url;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegBackend {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &ThumbforgeConfig) -> Self {
        Self::new(config.ffmpeg_path(), config.ffprobe_path())
    }
}

#[async_trait]
impl DecodeBackend for FfmpegBackend {
    async fn open(&self, url: &str, start_time: f64) -> Result<Box<dyn DecodeSession>> {
        let native = probe_dimensions(&self.ffprobe, url).await?;
        debug!(url = %redact_stream_url(url), %native, start_time, "Opened stream");

        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = FfmpegSession {
            ffmpeg: self.ffmpeg.clone(),
            url: url.to_string(),
            native,
            frame: None,
            seeking: false,
            generation: 0,
            tx,
            rx,
            task: None,
        };
        session.start_extraction(start_time, DecodeEvent::Loaded);
        Ok(Box::new(session))
    }
}

struct Extracted {
    generation: u64,
    event: DecodeEvent,
    frame: std::result::Result<RgbaImage, String>,
}

struct FfmpegSession {
    ffmpeg: PathBuf,
    url: String,
    native: Dimensions,
    frame: Option<RgbaImage>,
    seeking: bool,
    generation: u64,
    tx: mpsc::UnboundedSender<Extracted>,
    rx: mpsc::UnboundedReceiver<Extracted>,
    task: Option<JoinHandle<()>>,
}

impl FfmpegSession {
    fn start_extraction(&mut self, time: f64, on_success: DecodeEvent) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation += 1;

        let generation = self.generation;
        let ffmpeg = self.ffmpeg.clone();
        let url = self.url.clone();
        let native = self.native;
        let tx = self.tx.clone();
        self.task = Some(tokio::spawn(async move {
            let frame = extract_frame(&ffmpeg, &url, time, native)
                .await
                .map_err(|e| format!("{e:#}"));
            let _ = tx.send(Extracted {
                generation,
                event: on_success,
                frame,
            });
        }));
    }
}

#[async_trait]
impl DecodeSession for FfmpegSession {
    async fn next_event(&mut self) -> DecodeEvent {
        loop {
            let Some(extracted) = self.rx.recv().await else {
                return std::future::pending().await;
            };
            if extracted.generation != self.generation {
                continue;
            }
            self.task = None;
            self.seeking = false;
            return match extracted.frame {
                Ok(frame) => {
                    self.frame = Some(frame);
                    extracted.event
                }
                Err(message) => DecodeEvent::Error(message),
            };
        }
    }

    fn state(&self) -> PlaybackState {
        PlaybackState {
            has_current_frame: self.frame.is_some() && !self.seeking,
            seeking: self.seeking,
        }
    }

    fn seek(&mut self, time: f64) {
        self.seeking = true;
        self.start_extraction(time, DecodeEvent::Seeked);
    }

    fn native_dimensions(&self) -> Dimensions {
        self.native
    }

    fn capture(&self) -> Result<RgbaImage> {
        self.frame.clone().context("No frame decoded yet")
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.frame = None;
    }
}

/// Native width and height of the first video stream.
async fn probe_dimensions(ffprobe: &Path, url: &str) -> Result<Dimensions> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height", "-of", "csv=s=x:p=0"])
        .arg(url)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to run {}", ffprobe.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("ffprobe failed: {}", stderr.trim());
    }
    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `ffprobe -of csv=s=x:p=0` output such as `1920x1080`.
fn parse_probe_output(stdout: &str) -> Result<Dimensions> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .context("ffprobe reported no video stream")?;

    let mut parts = line.split('x').map(str::trim);
    let width: u32 = parts
        .next()
        .and_then(|w| w.parse().ok())
        .with_context(|| format!("Unexpected ffprobe output: {line}"))?;
    let height: u32 = parts
        .next()
        .and_then(|h| h.parse().ok())
        .with_context(|| format!("Unexpected ffprobe output: {line}"))?;

    if width == 0 || height == 0 {
        bail!("ffprobe reported an empty video stream: {line}");
    }
    Ok(Dimensions::new(width, height))
}

async fn extract_frame(ffmpeg: &Path, url: &str, time: f64, native: Dimensions) -> Result<RgbaImage> {
    let output = Command::new(ffmpeg)
        .args(["-v", "error", "-ss"])
        .arg(format!("{:.3}", time.max(0.0)))
        .arg("-i")
        .arg(url)
        .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to run {}", ffmpeg.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("ffmpeg exited with {}: {}", output.status, stderr.trim());
    }
    frame_from_raw(native, output.stdout)
}

fn frame_from_raw(native: Dimensions, raw: Vec<u8>) -> Result<RgbaImage> {
    let expected = native.width as usize * native.height as usize * 4;
    if raw.len() < expected {
        bail!(
            "ffmpeg returned {} bytes, expected {expected} for a {native} frame",
            raw.len()
        );
    }
    RgbaImage::from_raw(native.width, native.height, raw).context("Malformed raw frame")
}
