use facecheck_core::{CaptureTicket, Classification, ClassifyError, LandmarkSet};
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn classifier thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("classifier model failed integrity check: {0}")]
    Model(#[from] facecheck_models::ModelIntegrityError),
}

/// Frame frozen by the hold gate and handed to the classifier.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub ticket: CaptureTicket,
    pub at: Duration,
    pub image: Arc<RgbaImage>,
    pub landmarks: Option<LandmarkSet>,
}

/// A loaded classification model.
///
/// Runs on the engine thread, so implementations may block.
pub trait Classifier: Send + 'static {
    fn classify(&mut self, frame: &CapturedFrame) -> Result<Classification, ClassifyError>;
}

struct EngineRequest {
    frame: CapturedFrame,
    reply: oneshot::Sender<Result<Classification, ClassifyError>>,
}

/// Clone-safe handle to the classifier thread.
#[derive(Clone)]
pub struct ClassifierHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl ClassifierHandle {
    /// Classify a captured frame. A dead engine thread reports
    /// [`ClassifyError::Unavailable`].
    pub async fn classify(&self, frame: CapturedFrame) -> Result<Classification, ClassifyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest {
                frame,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ClassifyError::Unavailable)?;
        reply_rx.await.map_err(|_| ClassifyError::Unavailable)?
    }
}

/// Move an already-loaded classifier onto a dedicated OS thread.
///
/// The classifier is constructed once by the caller and shared by every
/// session through cloned handles.
pub fn spawn_engine<C: Classifier>(mut classifier: C) -> Result<ClassifierHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facecheck-classifier".into())
        .spawn(move || {
            tracing::info!("classifier thread started");
            while let Some(req) = rx.blocking_recv() {
                let ticket = req.frame.ticket;
                let result = classifier.classify(&req.frame);
                match &result {
                    Ok(c) => tracing::debug!(%ticket, gender = %c.gender, confidence = c.confidence, "classified"),
                    Err(e) => tracing::debug!(%ticket, error = %e, "classification error"),
                }
                // Receiver gone means the session moved on; nothing to do.
                let _ = req.reply.send(result);
            }
            tracing::info!("classifier thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(ClassifierHandle { tx })
}

/// Check the configured model file, then spawn the engine. Fails fast; there
/// is no automatic retry.
pub fn spawn_verified<C: Classifier>(
    config: &Config,
    classifier: C,
) -> Result<ClassifierHandle, EngineError> {
    if let (Some(path), Some(sha256)) = (&config.model_path, &config.model_sha256) {
        facecheck_models::verify_file_sha256("classifier", path, sha256)?;
        tracing::info!(path = %path.display(), "classifier model checksum ok");
    }
    spawn_engine(classifier)
}
