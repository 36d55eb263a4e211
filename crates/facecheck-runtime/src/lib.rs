//! Runtime for the face-verification flow: frame sampling, the classifier
//! worker thread, and the async session loop around
//! [`facecheck_core::Sequencer`].

pub mod config;
pub mod engine;
pub mod sampler;
pub mod session;

pub use config::{Config, ConfigFileError};
pub use engine::{
    spawn_engine, spawn_verified, CapturedFrame, Classifier, ClassifierHandle, EngineError,
};
pub use sampler::{Frame, FrameSampler};
pub use session::{
    CameraControl, Command, Feedback, FeedbackError, Session, SessionError, SessionReport,
};
