//! Head-turn challenge state machine.
//!
//! ```text
//! IDLE ──start──▶ LEFT ──yaw < left──▶ RIGHT ──yaw > right──▶ CENTER ──hold + classify──▶ COMPLETE
//!   ▲                                                           │  ▲
//!   └──────reset── STOPPED ◀──stop (any state but COMPLETE)     └──┘ classification failed
//! ```
//!
//! The sequencer never performs I/O. Every operation returns the [`Effect`]s
//! the host must carry out: play a beep, speak a prompt, capture a frame for
//! classification, release the camera, or hand the final [`Outcome`] to the
//! caller.

use crate::classify::{CaptureTicket, Classification, ClassifyError, Outcome, VerificationResult};
use crate::config::Thresholds;
use crate::geometry::{GeometrySnapshot, Observation};
use crate::hold::{HoldGate, HoldStep};
use crate::narration;
use crate::policy::is_face_well_positioned;

pub const READY: &str = "Ready to begin face verification";
pub const TURN_LEFT: &str = "Please turn your head to the left";
pub const TURN_RIGHT: &str = "Great! Now turn your head to the right";
pub const LOOK_CENTER: &str = "Now look straight at the camera";
pub const HOLD_STILL: &str = "Hold still, almost done";
pub const ANALYZING: &str = "Analyzing, please wait";
pub const RETRY: &str = "We could not verify that. Please look straight at the camera again";
pub const VERIFIED: &str = "Verification complete";
pub const STOPPED: &str = "Verification stopped";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Idle,
    Left,
    Right,
    Center,
    Complete,
    Stopped,
}

/// Side effect requested by the sequencer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Short confirmation tone.
    Beep,
    /// Speak a new instruction.
    Speak(String),
    /// Freeze the current frame and classify it; report back with
    /// [`Sequencer::on_classified`].
    Capture(CaptureTicket),
    ReleaseCamera,
    /// Hand the outcome to the caller.
    Finish(Outcome),
}

#[derive(Debug, Clone, Copy)]
struct PendingCapture {
    ticket: CaptureTicket,
    geometry: GeometrySnapshot,
}

/// Challenge sequencer for a single verification session.
#[derive(Debug)]
pub struct Sequencer {
    thresholds: Thresholds,
    state: ChallengeState,
    left_done: bool,
    right_done: bool,
    hold: HoldGate,
    analysis_started: bool,
    pending: Option<PendingCapture>,
    next_ticket: u64,
    instruction: &'static str,
    camera_held: bool,
}

impl Sequencer {
    /// The camera is assumed acquired when the sequencer is created.
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            state: ChallengeState::Idle,
            left_done: false,
            right_done: false,
            hold: HoldGate::new(),
            analysis_started: false,
            pending: None,
            next_ticket: 0,
            instruction: READY,
            camera_held: true,
        }
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    pub fn left_done(&self) -> bool {
        self.left_done
    }

    pub fn right_done(&self) -> bool {
        self.right_done
    }

    pub fn analysis_started(&self) -> bool {
        self.analysis_started
    }

    pub fn hold_started_at(&self) -> Option<std::time::Duration> {
        self.hold.started_at()
    }

    /// Last instruction issued to the user.
    pub fn instruction(&self) -> &'static str {
        self.instruction
    }

    pub fn camera_held(&self) -> bool {
        self.camera_held
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// On-screen status for the latest frame.
    pub fn commentary(&self, obs: &Observation) -> String {
        narration::commentary(self.state, obs.geometry.as_ref(), &self.thresholds)
    }

    /// Begin a session. Only valid from IDLE or STOPPED, and only while the
    /// camera is still held; a released camera is never re-acquired.
    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.state {
            _ if !self.camera_held => {
                tracing::warn!(state = ?self.state, "start ignored: camera already released");
            }
            ChallengeState::Idle | ChallengeState::Stopped => {
                self.clear_progress();
                self.state = ChallengeState::Left;
                tracing::info!("verification started");
                self.instruct(TURN_LEFT, &mut effects);
            }
            state => tracing::debug!(?state, "start ignored"),
        }
        effects
    }

    /// Feed one sampled frame.
    pub fn process(&mut self, obs: &Observation) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.state {
            ChallengeState::Left => {
                if self.turn_detected(obs, |yaw, t| yaw < t.left_yaw_threshold) {
                    self.left_done = true;
                    self.state = ChallengeState::Right;
                    tracing::info!(yaw = ?obs.geometry.map(|g| g.yaw), "left turn complete");
                    effects.push(Effect::Beep);
                    self.instruct(TURN_RIGHT, &mut effects);
                }
            }
            ChallengeState::Right => {
                if self.turn_detected(obs, |yaw, t| yaw > t.right_yaw_threshold) {
                    self.right_done = true;
                    self.state = ChallengeState::Center;
                    self.hold.clear();
                    tracing::info!(yaw = ?obs.geometry.map(|g| g.yaw), "right turn complete");
                    effects.push(Effect::Beep);
                    self.instruct(LOOK_CENTER, &mut effects);
                }
            }
            ChallengeState::Center if !self.analysis_started => {
                self.process_hold(obs, &mut effects);
            }
            _ => {}
        }
        effects
    }

    /// User abort. Valid from any state except COMPLETE; the camera stays
    /// held so a new session can start right away.
    pub fn stop(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.state {
            ChallengeState::Complete | ChallengeState::Stopped => {
                tracing::debug!(state = ?self.state, "stop ignored");
            }
            state => {
                tracing::info!(?state, "verification stopped by user");
                self.clear_progress();
                self.state = ChallengeState::Stopped;
                self.instruction = STOPPED;
                effects.push(Effect::Finish(Outcome::cancelled()));
            }
        }
        effects
    }

    /// Stop, then release the camera.
    pub fn close(&mut self) -> Vec<Effect> {
        let mut effects = self.stop();
        if self.camera_held {
            self.camera_held = false;
            effects.push(Effect::ReleaseCamera);
        }
        effects
    }

    /// Back to IDLE, dropping all progress.
    pub fn reset(&mut self) {
        self.clear_progress();
        self.state = ChallengeState::Idle;
        self.instruction = READY;
    }

    /// Apply a classification result. Results for a ticket the sequencer is
    /// no longer waiting on are dropped.
    pub fn on_classified(
        &mut self,
        ticket: CaptureTicket,
        result: Result<Classification, ClassifyError>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();

        let pending = match self.pending.take() {
            Some(p)
                if p.ticket == ticket
                    && self.state == ChallengeState::Center
                    && self.analysis_started =>
            {
                p
            }
            other => {
                self.pending = other;
                tracing::warn!(%ticket, state = ?self.state, "discarding stale classification result");
                return effects;
            }
        };

        match result {
            Ok(classification) => {
                tracing::info!(
                    %ticket,
                    gender = %classification.gender,
                    confidence = classification.confidence,
                    "classification succeeded"
                );
                let result = VerificationResult::new(classification, &pending.geometry);
                self.state = ChallengeState::Complete;
                self.hold.clear();
                effects.push(Effect::Beep);
                self.instruct(VERIFIED, &mut effects);
                if self.camera_held {
                    self.camera_held = false;
                    effects.push(Effect::ReleaseCamera);
                }
                effects.push(Effect::Finish(Outcome::Verified(result)));
            }
            Err(e) => {
                tracing::warn!(%ticket, error = %e, "classification failed, retrying final step");
                self.state = ChallengeState::Center;
                self.hold.clear();
                self.analysis_started = false;
                self.announce(RETRY, &mut effects);
            }
        }
        effects
    }

    fn turn_detected(&self, obs: &Observation, crossed: impl Fn(f32, &Thresholds) -> bool) -> bool {
        let Some(g) = obs.geometry else {
            return false;
        };
        is_face_well_positioned(g.face_distance, g.center_offset, &self.thresholds).is_good
            && crossed(g.yaw, &self.thresholds)
    }

    fn process_hold(&mut self, obs: &Observation, effects: &mut Vec<Effect>) {
        match self.hold.observe(obs, &self.thresholds) {
            HoldStep::Waiting | HoldStep::Started | HoldStep::Holding { .. } => {}
            HoldStep::PromptStill => self.announce(HOLD_STILL, effects),
            HoldStep::Blocked(reason) => self.instruct(reason.prompt(), effects),
            HoldStep::Reset(reason) => self.announce(reason.prompt(), effects),
            HoldStep::Fire(geometry) => {
                self.analysis_started = true;
                self.next_ticket += 1;
                let ticket = CaptureTicket(self.next_ticket);
                self.pending = Some(PendingCapture { ticket, geometry });
                tracing::info!(%ticket, "hold complete, capturing frame");
                self.instruct(ANALYZING, effects);
                effects.push(Effect::Capture(ticket));
            }
        }
    }

    fn clear_progress(&mut self) {
        self.left_done = false;
        self.right_done = false;
        self.hold.clear();
        self.analysis_started = false;
        self.pending = None;
    }

    /// Speak only when the instruction changes.
    fn instruct(&mut self, text: &'static str, effects: &mut Vec<Effect>) {
        if self.instruction != text {
            self.announce(text, effects);
        }
    }

    fn announce(&mut self, text: &'static str, effects: &mut Vec<Effect>) {
        self.instruction = text;
        effects.push(Effect::Speak(text.to_string()));
    }
}
