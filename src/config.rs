use serde_derive::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::Error;

pub const DEFAULT_DISTANCE_GATE: u32 = 60;
pub const DEFAULT_MISSED_FRAME_THRESHOLD: u32 = 10;
pub const DEFAULT_MIN_CONTOUR_AREA: u64 = 500;
pub const DEFAULT_MIN_WIDTH: u32 = 80;
pub const DEFAULT_MIN_HEIGHT: u32 = 80;
pub const DEFAULT_MAX_TRACKED_OBJECTS: usize = 1024;

/// Counter settings; every field falls back to its default when missing from the file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CounterConfig {
    /// Pixel row of the counting line, 2/3 of the frame height when unset
    pub reference_line_position: Option<u32>,

    /// Max vertical distance (exclusive) for a detection to continue a track
    pub distance_gate: u32,

    /// Tracks are dropped once missed for more than this many frames in a row
    pub missed_frame_threshold: u32,

    pub min_contour_area: u64,
    pub min_width: u32,
    pub min_height: u32,

    /// Applies `min_width`/`min_height` to detections when set
    pub filter_by_size: bool,

    pub max_tracked_objects: usize,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            reference_line_position: None,
            distance_gate: DEFAULT_DISTANCE_GATE,
            missed_frame_threshold: DEFAULT_MISSED_FRAME_THRESHOLD,
            min_contour_area: DEFAULT_MIN_CONTOUR_AREA,
            min_width: DEFAULT_MIN_WIDTH,
            min_height: DEFAULT_MIN_HEIGHT,
            filter_by_size: false,
            max_tracked_objects: DEFAULT_MAX_TRACKED_OBJECTS,
        }
    }
}

impl CounterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.distance_gate == 0 {
            return Err(Error::InvalidConfig(
                "distanceGate must be greater than zero".into(),
            ));
        }

        if self.max_tracked_objects == 0 {
            return Err(Error::InvalidConfig(
                "maxTrackedObjects must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Resolves the counting line row for a frame of the given height.
    ///
    /// An explicit row is taken as is, even outside the frame, in which case
    /// nothing can ever cross it.
    pub fn line_position(&self, height: u32) -> i32 {
        match self.reference_line_position {
            Some(pos) => {
                if pos >= height {
                    warn!(
                        "referenceLinePosition {} is outside of frame height {}",
                        pos, height
                    );
                }

                pos.min(i32::MAX as u32) as i32
            }
            None => (height as u64 * 2 / 3) as i32,
        }
    }
}
