//! Async driver for one verification session.
//!
//! The sequencer is synchronous; this loop feeds it sampled frames and user
//! commands, carries out the effects it returns, and routes classifier
//! replies back in. Replies travel with their capture ticket, so a reply for
//! a session that was stopped or restarted in the meantime is dropped by the
//! sequencer.

use chrono::{DateTime, Utc};
use facecheck_core::{
    CaptureTicket, Classification, ClassifyError, Effect, Outcome, Sequencer,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::{CapturedFrame, ClassifierHandle};
use crate::sampler::{Frame, FrameSampler};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid thresholds: {0}")]
    Config(#[from] facecheck_core::ConfigError),
    #[error("frame source closed before the session finished")]
    FrameSourceClosed,
}

#[derive(Error, Debug)]
#[error("feedback failed: {0}")]
pub struct FeedbackError(pub String);

/// Audio and on-screen feedback. Failures are logged and ignored.
pub trait Feedback: Send {
    fn beep(&mut self) -> Result<(), FeedbackError>;
    fn speak(&mut self, text: &str) -> Result<(), FeedbackError>;
    /// Live status line; called when it changes.
    fn status(&mut self, _text: &str) {}
}

/// The session's exclusively-owned camera.
pub trait CameraControl: Send {
    fn is_ready(&self) -> bool;
    fn release(&mut self);
}

/// User-initiated events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// Stop and release the camera.
    Close,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub classification_attempts: u32,
}

enum Event {
    Command(Option<Command>),
    Frame(Option<Frame>),
    Classified(Option<(CaptureTicket, Result<Classification, ClassifyError>)>),
}

type Reply = (CaptureTicket, Result<Classification, ClassifyError>);

pub struct Session<F: Feedback, C: CameraControl> {
    id: Uuid,
    sequencer: Sequencer,
    sampler: FrameSampler,
    engine: ClassifierHandle,
    feedback: F,
    camera: C,
    latest: Option<Frame>,
    last_status: String,
    frames_processed: u64,
    attempts: u32,
    replies_tx: mpsc::Sender<Reply>,
    replies_rx: mpsc::Receiver<Reply>,
}

impl<F: Feedback, C: CameraControl> Session<F, C> {
    pub fn new(
        config: &Config,
        engine: ClassifierHandle,
        feedback: F,
        camera: C,
    ) -> Result<Self, SessionError> {
        config.thresholds.validate()?;
        let (replies_tx, replies_rx) = mpsc::channel(4);
        let id = Uuid::new_v4();
        tracing::info!(session_id = %id, "session opened");
        Ok(Self {
            id,
            sequencer: Sequencer::new(config.thresholds.clone()),
            sampler: FrameSampler::new(config.sample_interval()),
            engine,
            feedback,
            camera,
            latest: None,
            last_status: String::new(),
            frames_processed: 0,
            attempts: 0,
            replies_tx,
            replies_rx,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    /// Run until the sequencer produces an outcome.
    ///
    /// Nothing happens until a [`Command::Start`] arrives. After a
    /// cancellation the session keeps its camera and may be run again.
    pub async fn run(
        &mut self,
        frames: &mut mpsc::Receiver<Frame>,
        commands: &mut mpsc::Receiver<Command>,
    ) -> Result<SessionReport, SessionError> {
        let started_at = Utc::now();
        let mut frames_open = true;
        let mut commands_open = true;

        loop {
            // User commands take priority over queued frames.
            let event = tokio::select! {
                biased;
                cmd = commands.recv(), if commands_open => Event::Command(cmd),
                reply = self.replies_rx.recv() => Event::Classified(reply),
                frame = frames.recv(), if frames_open => Event::Frame(frame),
            };

            let effects = match event {
                Event::Command(Some(cmd)) => self.on_command(cmd),
                Event::Command(None) => {
                    commands_open = false;
                    Vec::new()
                }
                Event::Frame(Some(frame)) => self.on_frame(frame),
                Event::Frame(None) => {
                    tracing::warn!(session_id = %self.id, "frame source closed");
                    frames_open = false;
                    Vec::new()
                }
                Event::Classified(Some((ticket, result))) => {
                    self.sequencer.on_classified(ticket, result)
                }
                Event::Classified(None) => Vec::new(),
            };

            if let Some(outcome) = self.dispatch(effects) {
                let report = SessionReport {
                    session_id: self.id,
                    started_at,
                    finished_at: Utc::now(),
                    outcome,
                    frames_processed: self.frames_processed,
                    frames_dropped: self.sampler.dropped(),
                    classification_attempts: self.attempts,
                };
                tracing::info!(
                    session_id = %self.id,
                    success = report.outcome.is_success(),
                    frames = report.frames_processed,
                    attempts = report.classification_attempts,
                    "session finished"
                );
                return Ok(report);
            }

            // Without frames only an in-flight classification can still finish.
            if !frames_open && !self.sequencer.analysis_started() {
                return Err(SessionError::FrameSourceClosed);
            }
        }
    }

    fn on_command(&mut self, cmd: Command) -> Vec<Effect> {
        tracing::debug!(session_id = %self.id, ?cmd, "command");
        match cmd {
            Command::Start => self.sequencer.start(),
            Command::Stop => self.sequencer.stop(),
            Command::Close => self.sequencer.close(),
        }
    }

    fn on_frame(&mut self, frame: Frame) -> Vec<Effect> {
        if !self.sampler.admit(frame.at) {
            return Vec::new();
        }
        self.frames_processed += 1;

        let obs = frame.observe(self.sequencer.thresholds().yaw_convention);
        let effects = self.sequencer.process(&obs);

        let status = self.sequencer.commentary(&obs);
        if status != self.last_status {
            self.feedback.status(&status);
            self.last_status = status;
        }

        self.latest = Some(frame);
        effects
    }

    /// Carry out effects. Returns the outcome if one was emitted.
    fn dispatch(&mut self, effects: Vec<Effect>) -> Option<Outcome> {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut finished = None;

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Beep => {
                    if let Err(e) = self.feedback.beep() {
                        tracing::debug!(error = %e, "beep failed");
                    }
                }
                Effect::Speak(text) => {
                    if let Err(e) = self.feedback.speak(&text) {
                        tracing::debug!(error = %e, "speech failed");
                    }
                }
                Effect::ReleaseCamera => {
                    self.camera.release();
                    tracing::info!(session_id = %self.id, "camera released");
                }
                Effect::Capture(ticket) => match self.capture(ticket) {
                    Ok(frame) => self.classify(ticket, frame),
                    Err(e) => queue.extend(self.sequencer.on_classified(ticket, Err(e))),
                },
                Effect::Finish(outcome) => finished = Some(outcome),
            }
        }

        finished
    }

    fn capture(&self, ticket: CaptureTicket) -> Result<CapturedFrame, ClassifyError> {
        if !self.camera.is_ready() {
            return Err(ClassifyError::CameraNotReady);
        }
        let frame = self.latest.as_ref().ok_or(ClassifyError::NoFrame)?;
        Ok(CapturedFrame {
            ticket,
            at: frame.at,
            image: Arc::clone(&frame.image),
            landmarks: frame.landmarks.clone(),
        })
    }

    fn classify(&mut self, ticket: CaptureTicket, frame: CapturedFrame) {
        self.attempts += 1;
        tracing::debug!(session_id = %self.id, %ticket, attempt = self.attempts, "classification requested");

        let engine = self.engine.clone();
        let replies = self.replies_tx.clone();
        tokio::spawn(async move {
            let result = engine.classify(frame).await;
            // Session dropped: nobody is waiting for this result.
            let _ = replies.send((ticket, result)).await;
        });
    }
}
