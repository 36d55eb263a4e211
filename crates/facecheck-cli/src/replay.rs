//! `facecheck replay`: runs a recorded landmark trace through a full session.
//!
//! A trace is JSON lines, one frame per line:
//!
//! ```text
//! {"at_ms": 0, "landmarks": [[0.5, 0.5], ...], "lighting": 128}
//! {"at_ms": 100, "landmarks": null}
//! ```
//!
//! `landmarks: null` (or missing) means no face was detected. `lighting` is
//! the gray level of the synthesized frame and defaults to 128.

use anyhow::{bail, Context, Result};
use clap::Args;
use facecheck_core::{Classification, ClassifyError, LandmarkSet};
use facecheck_runtime::{
    spawn_verified, CameraControl, CapturedFrame, Classifier, Command, Config, Feedback,
    FeedbackError, Frame, Session, SessionReport,
};
use image::{Rgba, RgbaImage};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::load_config;

const FRAME_WIDTH: u32 = 32;
const FRAME_HEIGHT: u32 = 24;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines trace file
    pub trace: PathBuf,

    /// TOML config file (thresholds, sampling, model checksum)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Label the scripted classifier answers with
    #[arg(long, default_value = "female")]
    pub gender: String,

    /// Classifier confidence on the 0-100 scale
    #[arg(long, default_value_t = 90.0)]
    pub confidence: f32,

    /// Fail this many classification attempts before answering
    #[arg(long, default_value_t = 0)]
    pub fail_attempts: u32,

    /// Send a stop once the trace reaches this timestamp
    #[arg(long)]
    pub stop_at_ms: Option<u64>,

    /// With --stop-at-ms, close the session (releasing the camera) instead
    #[arg(long, requires = "stop_at_ms")]
    pub close: bool,
}

#[derive(Debug, Deserialize)]
struct TraceRecord {
    at_ms: u64,
    #[serde(default)]
    landmarks: Option<LandmarkSet>,
    #[serde(default = "default_lighting")]
    lighting: u8,
}

fn default_lighting() -> u8 {
    128
}

impl From<TraceRecord> for Frame {
    fn from(record: TraceRecord) -> Self {
        let luma = record.lighting;
        Frame::new(
            Duration::from_millis(record.at_ms),
            record.landmarks,
            RgbaImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgba([luma, luma, luma, 255])),
        )
    }
}

/// Parse a trace. Blank lines and lines starting with `#` are skipped.
pub fn parse_trace(text: &str) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(line)
            .with_context(|| format!("invalid trace record on line {}", idx + 1))?;
        frames.push(record.into());
    }
    if frames.is_empty() {
        bail!("trace contains no frames");
    }
    Ok(frames)
}

/// Answers every request with a fixed label after an optional run of failures.
pub struct ScriptedClassifier {
    gender: String,
    confidence: f32,
    failures_left: u32,
}

impl ScriptedClassifier {
    pub fn new(gender: impl Into<String>, confidence: f32, fail_attempts: u32) -> Self {
        Self {
            gender: gender.into(),
            confidence,
            failures_left: fail_attempts,
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&mut self, frame: &CapturedFrame) -> Result<Classification, ClassifyError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            tracing::info!(ticket = %frame.ticket, remaining = self.failures_left, "scripted failure");
            return Err(ClassifyError::Model("scripted failure".into()));
        }
        Ok(Classification {
            gender: self.gender.clone(),
            confidence: self.confidence,
        })
    }
}

/// Routes feedback into the log.
struct LogFeedback;

impl Feedback for LogFeedback {
    fn beep(&mut self) -> Result<(), FeedbackError> {
        tracing::info!("beep");
        Ok(())
    }

    fn speak(&mut self, text: &str) -> Result<(), FeedbackError> {
        tracing::info!(text, "speak");
        Ok(())
    }

    fn status(&mut self, text: &str) {
        tracing::debug!(text, "status");
    }
}

#[derive(Default)]
struct ReplayCamera {
    released: bool,
}

impl CameraControl for ReplayCamera {
    fn is_ready(&self) -> bool {
        !self.released
    }

    fn release(&mut self) {
        tracing::info!("camera released");
        self.released = true;
    }
}

/// Feed `frames` through a fresh session. When `stop` is set, its command is
/// sent in place of the first frame at or after the given time.
pub async fn replay(
    config: &Config,
    frames: Vec<Frame>,
    classifier: ScriptedClassifier,
    stop: Option<(Duration, Command)>,
) -> Result<SessionReport> {
    let engine = spawn_verified(config, classifier).context("failed to start classifier")?;
    let mut session = Session::new(config, engine, LogFeedback, ReplayCamera::default())?;

    let (frame_tx, mut frame_rx) = mpsc::channel(16);
    let (command_tx, mut command_rx) = mpsc::channel(2);
    command_tx.send(Command::Start).await?;

    let feeder = tokio::spawn(async move {
        for frame in frames {
            if let Some((at, command)) = stop {
                if frame.at >= at {
                    let _ = command_tx.send(command).await;
                    return;
                }
            }
            if frame_tx.send(frame).await.is_err() {
                return;
            }
        }
    });

    let report = session
        .run(&mut frame_rx, &mut command_rx)
        .await
        .context("session did not finish");

    // Unblocks the feeder if the session finished before the trace did.
    drop(frame_rx);
    drop(command_rx);
    let _ = feeder.await;

    report
}

pub async fn run(args: ReplayArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let text = fs::read_to_string(&args.trace)
        .with_context(|| format!("failed to read {}", args.trace.display()))?;
    let frames = parse_trace(&text)?;
    tracing::info!(frames = frames.len(), trace = %args.trace.display(), "replaying trace");

    let stop_command = if args.close {
        Command::Close
    } else {
        Command::Stop
    };
    let stop = args
        .stop_at_ms
        .map(|ms| (Duration::from_millis(ms), stop_command));
    let classifier = ScriptedClassifier::new(args.gender, args.confidence, args.fail_attempts);

    let report = replay(&config, frames, classifier, stop).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecheck_core::geometry::{CHIN, FOREHEAD, LEFT_EAR, NOSE_TIP, RIGHT_EAR};
    use facecheck_core::Outcome;
    use serde_json::json;

    fn face(yaw: f32) -> Vec<[f32; 2]> {
        let mut points = vec![[0.5, 0.5]; 468];
        points[LEFT_EAR] = [0.35, 0.5];
        points[RIGHT_EAR] = [0.65, 0.5];
        points[FOREHEAD] = [0.5, 0.3];
        points[CHIN] = [0.5, 0.7];
        points[NOSE_TIP] = [0.5 - yaw.to_radians().sin() * 0.15, 0.5];
        points
    }

    /// Center, left, right, then a 2.5 s center hold at 10 fps.
    fn happy_trace() -> String {
        let mut yaws = vec![0.0, -40.0, -40.0, 40.0, 40.0];
        yaws.extend(std::iter::repeat(0.0).take(25));
        yaws.iter()
            .enumerate()
            .map(|(i, yaw)| {
                json!({ "at_ms": i as u64 * 100, "landmarks": face(*yaw), "lighting": 140 })
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_parse_trace_defaults_and_comments() {
        let text = "# recorded 2026-10-01\n\n{\"at_ms\": 0}\n{\"at_ms\": 50, \"landmarks\": null, \"lighting\": 10}\n";
        let frames = parse_trace(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].landmarks.is_none());
        assert!((frames[0].lighting() - 128.0).abs() < 1.0);
        assert_eq!(frames[1].at, Duration::from_millis(50));
        assert!(frames[1].lighting() < 20.0);
    }

    #[test]
    fn test_parse_trace_reports_line_number() {
        let err = parse_trace("{\"at_ms\": 0}\nnot json\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn test_parse_trace_rejects_empty() {
        assert!(parse_trace("\n# nothing\n").is_err());
    }

    #[tokio::test]
    async fn test_replay_happy_trace_verifies() {
        let frames = parse_trace(&happy_trace()).unwrap();
        let report = replay(
            &Config::default(),
            frames,
            ScriptedClassifier::new("male", 64.0, 0),
            None,
        )
        .await
        .unwrap();

        match report.outcome {
            Outcome::Verified(result) => {
                assert_eq!(result.gender, "male");
                assert!((result.confidence - 0.64).abs() < 1e-6);
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(report.classification_attempts, 1);
        assert!(report.frames_processed >= 26);
    }

    #[tokio::test]
    async fn test_replay_stop_cancels() {
        let frames = parse_trace(&happy_trace()).unwrap();
        let report = replay(
            &Config::default(),
            frames,
            ScriptedClassifier::new("female", 90.0, 0),
            Some((Duration::from_millis(300), Command::Stop)),
        )
        .await
        .unwrap();

        assert_eq!(report.outcome, Outcome::cancelled());
        assert_eq!(report.classification_attempts, 0);
    }

    #[tokio::test]
    async fn test_replay_trace_ending_early_is_an_error() {
        let frames = parse_trace(&happy_trace()).unwrap();
        let short: Vec<Frame> = frames.into_iter().take(6).collect();
        let err = replay(
            &Config::default(),
            short,
            ScriptedClassifier::new("female", 90.0, 0),
            None,
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("frame source closed"));
    }
}
