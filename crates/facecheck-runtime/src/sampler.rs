//! Frame intake and rate limiting.

use facecheck_core::geometry::compute_lighting;
use facecheck_core::{LandmarkSet, Observation, YawConvention};
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;

/// A camera frame with the landmarks the face-mesh model found in it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Offset from the start of the camera stream.
    pub at: Duration,
    /// `None` when no face was detected.
    pub landmarks: Option<LandmarkSet>,
    pub image: Arc<RgbaImage>,
}

impl Frame {
    pub fn new(at: Duration, landmarks: Option<LandmarkSet>, image: RgbaImage) -> Self {
        Self {
            at,
            landmarks,
            image: Arc::new(image),
        }
    }

    pub fn lighting(&self) -> f32 {
        compute_lighting(self.image.as_raw(), self.image.width(), self.image.height())
    }

    pub fn observe(&self, convention: YawConvention) -> Observation {
        Observation::from_landmarks(self.at, self.landmarks.as_ref(), self.lighting(), convention)
    }
}

/// Admits at most one frame per `interval`.
#[derive(Debug)]
pub struct FrameSampler {
    interval: Duration,
    last: Option<Duration>,
    dropped: u64,
}

impl FrameSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            dropped: 0,
        }
    }

    /// Whether the frame at `at` should be processed. A timestamp earlier
    /// than the last admitted one means the stream restarted and is admitted.
    pub fn admit(&mut self, at: Duration) -> bool {
        if let Some(last) = self.last {
            if at >= last && at - last < self.interval {
                self.dropped += 1;
                return false;
            }
        }
        self.last = Some(at);
        true
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_first_frame_admitted() {
        let mut sampler = FrameSampler::new(ms(100));
        assert!(sampler.admit(ms(0)));
    }

    #[test]
    fn test_drops_frames_inside_interval() {
        let mut sampler = FrameSampler::new(ms(100));
        assert!(sampler.admit(ms(0)));
        assert!(!sampler.admit(ms(33)));
        assert!(!sampler.admit(ms(66)));
        assert!(sampler.admit(ms(100)));
        assert!(!sampler.admit(ms(133)));
        assert_eq!(sampler.dropped(), 3);
    }

    #[test]
    fn test_zero_interval_admits_everything() {
        let mut sampler = FrameSampler::new(Duration::ZERO);
        assert!(sampler.admit(ms(0)));
        assert!(sampler.admit(ms(0)));
        assert!(sampler.admit(ms(1)));
    }

    #[test]
    fn test_restarted_stream_admitted() {
        let mut sampler = FrameSampler::new(ms(100));
        assert!(sampler.admit(ms(5000)));
        assert!(sampler.admit(ms(10)));
    }

    #[test]
    fn test_frame_lighting_from_image() {
        let frame = Frame::new(ms(0), None, RgbaImage::from_pixel(4, 3, Rgba([90, 120, 150, 255])));
        assert!((frame.lighting() - 120.0).abs() < 1e-4);
        assert!(frame.observe(YawConvention::Mirrored).geometry.is_none());
    }
}
