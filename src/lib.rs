pub mod config;
pub mod crossing;
pub mod detection;
pub mod dump;
pub mod error;
pub mod filter;
pub mod frame;
pub mod scene;
pub mod track;

pub use config::CounterConfig;
pub use crossing::{Counts, CrossingEvent, Direction};
pub use detection::Detection;
pub use frame::Frame;
pub use track::{TrackStatus, TrackedObject};

use error::Error;
use filter::DetectionFilter;
use scene::Scene;
use serde_derive::{Deserialize, Serialize};

pub trait Counting {
    fn update(&mut self, frame: &Frame) -> Result<FrameReport, Error>;
    fn counts(&self) -> Counts;
    fn reset(&mut self);
}

/// Everything a frame produced, enough to draw it
#[derive(Serialize, Debug, Clone)]
pub struct FrameReport {
    pub frame: u64,
    /// Accepted detections with the id of the track they were given
    pub matches: Vec<(Detection, u32)>,
    pub events: Vec<CrossingEvent>,
    pub evicted: Vec<u32>,
    pub counts: Counts,
    pub objects: Vec<TrackedObject>,
}

/// Counting line and totals as shown on top of the video
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlay {
    pub line: i32,
    pub width: u32,
    pub up: u64,
    pub down: u64,
    pub total: u64,
}

/// Serializable session state, consistent at any frame boundary
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub config: CounterConfig,
    pub dims: Option<(u32, u32)>,
    pub scene: Option<Scene>,
    pub counts: Counts,
    pub frames: u64,
}

/// One counting session over a single video source
pub struct LineCounter {
    config: CounterConfig,
    filter: DetectionFilter,
    dims: Option<(u32, u32)>,
    scene: Option<Scene>,
    counts: Counts,
    frames: u64,
}

impl LineCounter {
    pub fn new(config: CounterConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            filter: DetectionFilter::new(&config),
            config,
            dims: None,
            scene: None,
            counts: Counts::default(),
            frames: 0,
        })
    }

    pub fn restore(checkpoint: Checkpoint) -> Result<Self, Error> {
        match (&checkpoint.dims, &checkpoint.scene) {
            (Some(_), Some(scene)) => scene.validate()?,
            (None, None) => (),
            _ => {
                return Err(Error::InvalidCheckpoint(
                    "frame dims and scene must be saved together".into(),
                ))
            }
        }

        let mut counter = Self::new(checkpoint.config)?;
        counter.dims = checkpoint.dims;
        counter.scene = checkpoint.scene;
        counter.counts = checkpoint.counts;
        counter.frames = checkpoint.frames;

        Ok(counter)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            config: self.config.clone(),
            dims: self.dims,
            scene: self.scene.clone(),
            counts: self.counts,
            frames: self.frames,
        }
    }

    /// Frame size the session was started with
    #[inline]
    pub fn dims(&self) -> Option<(u32, u32)> {
        self.dims
    }

    #[inline]
    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// Counting line row, known once the first frame was seen
    #[inline]
    pub fn line(&self) -> Option<i32> {
        self.scene.as_ref().map(|s| s.line)
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[inline]
    pub fn objects(&self) -> &[TrackedObject] {
        match &self.scene {
            Some(scene) => scene.tracks(),
            None => &[],
        }
    }

    pub fn overlay(&self) -> Option<Overlay> {
        let scene = self.scene.as_ref()?;
        let (width, _) = self.dims?;

        Some(Overlay {
            line: scene.line,
            width,
            up: self.counts.up,
            down: self.counts.down,
            total: self.counts.total(),
        })
    }

    fn scene_for(&mut self, frame: &Frame) -> Result<&mut Scene, Error> {
        let (width, height) = (frame.width(), frame.height());

        if self.scene.is_none() {
            if width == 0 || height == 0 {
                return Err(Error::InvalidFrame { width, height });
            }

            let line = self.config.line_position(height);
            tracing::debug!("counting line at row {} for {}x{}", line, width, height);

            self.dims = Some(frame.dims);
            self.scene = Some(Scene::new(line, &self.config));
        }

        self.scene
            .as_mut()
            .ok_or(Error::InvalidFrame { width, height })
    }
}

impl Counting for LineCounter {
    fn update(&mut self, frame: &Frame) -> Result<FrameReport, Error> {
        let detections = self.filter.apply(frame);
        let scene = self.scene_for(frame)?;

        let mapping = scene.map_detections(&detections);
        tracing::trace!(
            "frame {}: {} of {} detections matched",
            frame.index,
            mapping.matched(),
            detections.len()
        );

        let upd = scene.update(mapping);
        let objects = scene.tracks().to_vec();

        let mut events = Vec::with_capacity(upd.crossings.len());
        for (id, direction) in upd.crossings {
            self.counts.record(direction);
            events.push(CrossingEvent {
                frame: frame.index,
                id,
                direction,
            });
        }

        self.frames += 1;

        Ok(FrameReport {
            frame: frame.index,
            matches: detections
                .iter()
                .zip(upd.ids)
                .filter_map(|(det, id)| Some((*det, id?)))
                .collect(),
            events,
            evicted: upd.evicted,
            counts: self.counts,
            objects,
        })
    }

    #[inline]
    fn counts(&self) -> Counts {
        self.counts
    }

    fn reset(&mut self) {
        self.dims = None;
        self.scene = None;
        self.counts = Counts::default();
        self.frames = 0;
    }
}
