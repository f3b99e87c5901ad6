use serde_derive::{Deserialize, Serialize};

use crate::crossing::{check_crossing, Direction};
use crate::detection::Detection;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Tracking,
    CountedUp,
    CountedDown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub id: u32,
    pub last_y: i32,
    pub prev_y: Option<i32>,
    pub missed_frames: u32,
    pub counted: bool,
    pub direction: Option<Direction>,

    // last matched blob, kept for drawing
    pub rect: Detection,
}

impl TrackedObject {
    pub fn new(id: u32, det: &Detection) -> Self {
        Self {
            id,
            last_y: det.cy(),
            prev_y: None,
            missed_frames: 0,
            counted: false,
            direction: None,
            rect: *det,
        }
    }

    #[inline]
    pub fn hit(&mut self, det: &Detection) {
        self.last_y = det.cy();
        self.missed_frames = 0;
        self.rect = *det;
    }

    #[inline]
    pub fn miss(&mut self) {
        self.missed_frames += 1;
    }

    /// Checks the move from `prev_y` to `last_y` against the line, then
    /// shifts `last_y` into `prev_y` for the next frame.
    ///
    /// Returns a direction at most once over the object's lifetime.
    pub fn settle(&mut self, line: i32) -> Option<Direction> {
        let mut crossed = None;

        if !self.counted {
            crossed = check_crossing(self.prev_y, self.last_y, line);

            if let Some(dir) = crossed {
                self.counted = true;
                self.direction = Some(dir);
            }
        }

        self.prev_y = Some(self.last_y);

        crossed
    }

    pub fn status(&self) -> TrackStatus {
        match self.direction {
            Some(Direction::Up) => TrackStatus::CountedUp,
            Some(Direction::Down) => TrackStatus::CountedDown,
            None => TrackStatus::Tracking,
        }
    }
}
