use crate::config::CounterConfig;
use crate::detection::Detection;
use crate::frame::Frame;

/// Drops blobs too small to be an object before they reach the tracker
#[derive(Debug, Clone, Copy)]
pub struct DetectionFilter {
    min_area: u64,
    min_size: Option<(u32, u32)>,
}

impl DetectionFilter {
    pub fn new(config: &CounterConfig) -> Self {
        Self {
            min_area: config.min_contour_area,
            min_size: if config.filter_by_size {
                Some((config.min_width, config.min_height))
            } else {
                None
            },
        }
    }

    /// Rects sticking out of the `(width, height)` frame are rejected too
    #[inline]
    pub fn accepts(&self, det: &Detection, dims: (u32, u32)) -> bool {
        if det.is_empty() || det.area() <= self.min_area {
            return false;
        }

        if !det.fits(dims) {
            tracing::warn!("detection {:?} is outside of {}x{} frame", det, dims.0, dims.1);
            return false;
        }

        match self.min_size {
            Some((mw, mh)) => det.w >= mw && det.h >= mh,
            None => true,
        }
    }

    pub fn apply(&self, frame: &Frame) -> Vec<Detection> {
        frame
            .detections
            .iter()
            .filter(|d| self.accepts(d, frame.dims))
            .copied()
            .collect()
    }
}
