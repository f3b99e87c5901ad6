use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CounterConfig;
use crate::crossing::Direction;
use crate::detection::Detection;
use crate::error::Error;
use crate::track::TrackedObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Index of the track in `Scene::tracks`
    Matched(usize),
    Missed,
}

/// Per-detection association computed against a scene snapshot.
///
/// Only valid for the scene it was produced by, until that scene is updated.
#[derive(Debug, Clone)]
pub struct DetectionsMapping<'a> {
    detections: &'a [Detection],
    assignments: Vec<Assignment>,
}

impl DetectionsMapping<'_> {
    #[inline]
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    #[inline]
    pub fn matched(&self) -> usize {
        self.assignments
            .iter()
            .filter(|a| matches!(a, Assignment::Matched(_)))
            .count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneUpdate {
    /// Track id per input detection, `None` when the detection was dropped
    pub ids: Vec<Option<u32>>,
    pub created: Vec<u32>,
    pub crossings: Vec<(u32, Direction)>,
    pub evicted: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Scene {
    pub line: i32,
    pub tracks: Vec<TrackedObject>,
    next_id: u32,
    distance_gate: u32,
    missed_frame_threshold: u32,
    max_tracks: usize,
}

impl Scene {
    pub fn new(line: i32, config: &CounterConfig) -> Self {
        Self {
            line,
            tracks: Vec::with_capacity(64),
            next_id: 0,
            distance_gate: config.distance_gate,
            missed_frame_threshold: config.missed_frame_threshold,
            max_tracks: config.max_tracked_objects,
        }
    }

    /// Greedy nearest match on the vertical axis, in detection order.
    ///
    /// A track claimed by one detection is not offered to the following ones,
    /// ties go to the track that comes first in the registry.
    pub fn map_detections<'a>(&self, detections: &'a [Detection]) -> DetectionsMapping<'a> {
        let mut claimed = vec![false; self.tracks.len()];

        let assignments = detections
            .iter()
            .map(|det| {
                let cy = det.cy();
                let mut best: Option<(usize, u32)> = None;

                for (idx, track) in self.tracks.iter().enumerate() {
                    if claimed[idx] {
                        continue;
                    }

                    let dist = track.last_y.abs_diff(cy);
                    if dist < self.distance_gate && best.map_or(true, |(_, d)| dist < d) {
                        best = Some((idx, dist));
                    }
                }

                match best {
                    Some((idx, _)) => {
                        claimed[idx] = true;
                        Assignment::Matched(idx)
                    }
                    None => Assignment::Missed,
                }
            })
            .collect();

        DetectionsMapping {
            detections,
            assignments,
        }
    }

    pub fn update(&mut self, mapping: DetectionsMapping<'_>) -> SceneUpdate {
        let mut result = SceneUpdate {
            ids: Vec::with_capacity(mapping.detections.len()),
            ..Default::default()
        };

        let mut used = vec![false; self.tracks.len()];

        for (det, assignment) in mapping.detections.iter().zip(mapping.assignments) {
            let idx = match assignment {
                Assignment::Matched(idx) => {
                    self.tracks[idx].hit(det);
                    used[idx] = true;
                    idx
                }
                Assignment::Missed => {
                    if self.tracks.len() >= self.max_tracks {
                        warn!(
                            "track limit {} reached, dropping detection at y={}",
                            self.max_tracks,
                            det.cy()
                        );
                        result.ids.push(None);
                        continue;
                    }

                    let id = self.next_id;
                    self.next_id += 1;

                    debug!("new track {} at y={}", id, det.cy());
                    self.tracks.push(TrackedObject::new(id, det));
                    used.push(true);
                    result.created.push(id);

                    self.tracks.len() - 1
                }
            };

            let track = &mut self.tracks[idx];
            if let Some(dir) = track.settle(self.line) {
                info!("track {} crossed line {} going {}", track.id, self.line, dir);
                result.crossings.push((track.id, dir));
            }

            result.ids.push(Some(track.id));
        }

        for (track, used) in self.tracks.iter_mut().zip(used) {
            if !used {
                track.miss();
            }
        }

        let threshold = self.missed_frame_threshold;
        let evicted = &mut result.evicted;

        self.tracks.retain(|t| {
            if t.missed_frames > threshold {
                debug!("track {} lost after {} frames", t.id, t.missed_frames);
                evicted.push(t.id);
                return false;
            }

            true
        });

        result
    }

    /// Checks a deserialized scene can continue without reusing ids
    pub fn validate(&self) -> Result<(), Error> {
        let mut prev: Option<u32> = None;

        for t in &self.tracks {
            if t.id >= self.next_id {
                return Err(Error::InvalidCheckpoint(format!(
                    "track id {} is not below next id {}",
                    t.id, self.next_id
                )));
            }

            if prev.map_or(false, |p| t.id <= p) {
                return Err(Error::InvalidCheckpoint(format!(
                    "track ids out of order at {}",
                    t.id
                )));
            }

            if t.counted != t.direction.is_some() {
                return Err(Error::InvalidCheckpoint(format!(
                    "track {} has counted={} without matching direction",
                    t.id, t.counted
                )));
            }

            prev = Some(t.id);
        }

        Ok(())
    }

    #[inline]
    pub fn tracks(&self) -> &[TrackedObject] {
        &self.tracks
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&TrackedObject> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Id the next created track will get
    #[inline]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det_at(cy: u32) -> Detection {
        Detection::new(50, cy - 10, 30, 20)
    }

    fn step(scene: &mut Scene, dets: &[Detection]) -> SceneUpdate {
        let mapping = scene.map_detections(dets);
        scene.update(mapping)
    }

    fn scene(line: i32) -> Scene {
        Scene::new(line, &CounterConfig::default())
    }

    #[test]
    fn nearest_within_gate_wins() {
        let mut s = scene(400);
        step(&mut s, &[det_at(50), det_at(200)]);

        let dets = [det_at(60)];
        let mapping = s.map_detections(&dets);
        assert_eq!(mapping.assignments(), &[Assignment::Matched(0)]);

        let upd = s.update(mapping);
        assert_eq!(upd.ids, vec![Some(0)]);
        assert!(upd.created.is_empty());
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn gate_is_exclusive() {
        let mut s = scene(400);
        step(&mut s, &[det_at(100)]);

        let upd = step(&mut s, &[det_at(160)]);
        assert_eq!(upd.ids, vec![Some(1)]);
        assert_eq!(upd.created, vec![1]);

        let upd = step(&mut s, &[det_at(159)]);
        assert_eq!(upd.ids, vec![Some(1)]);
    }

    #[test]
    fn one_detection_per_track_per_frame() {
        let mut s = scene(400);
        step(&mut s, &[det_at(100)]);

        let upd = step(&mut s, &[det_at(105), det_at(110)]);

        assert_eq!(upd.ids, vec![Some(0), Some(1)]);
        assert_eq!(upd.created, vec![1]);
        assert_eq!(s.get(0).map(|t| t.last_y), Some(105));
        assert_eq!(s.get(1).map(|t| t.last_y), Some(110));
    }

    #[test]
    fn same_frame_tracks_are_not_reused() {
        let mut s = scene(400);

        let upd = step(&mut s, &[det_at(100), det_at(100)]);
        assert_eq!(upd.ids, vec![Some(0), Some(1)]);
    }

    #[test]
    fn ties_go_to_first_registered() {
        let mut s = scene(400);
        step(&mut s, &[det_at(100), det_at(200)]);

        let dets = [det_at(150)];
        let mapping = s.map_detections(&dets);
        assert_eq!(mapping.assignments(), &[Assignment::Matched(0)]);
    }

    #[test]
    fn eviction_after_threshold() {
        let mut s = scene(400);
        step(&mut s, &[det_at(100)]);

        for _ in 0..10 {
            let upd = step(&mut s, &[]);
            assert!(upd.evicted.is_empty());
        }
        assert_eq!(s.get(0).map(|t| t.missed_frames), Some(10));

        let upd = step(&mut s, &[]);
        assert_eq!(upd.evicted, vec![0]);
        assert!(s.is_empty());

        let upd = step(&mut s, &[det_at(100)]);
        assert_eq!(upd.created, vec![1]);
        assert!(!s.get(1).unwrap().counted);
    }

    #[test]
    fn crossing_reported_once() {
        let mut s = scene(120);
        step(&mut s, &[det_at(100)]);

        let upd = step(&mut s, &[det_at(150)]);
        assert_eq!(upd.crossings, vec![(0, Direction::Down)]);

        let upd = step(&mut s, &[det_at(100)]);
        assert!(upd.crossings.is_empty());
        let upd = step(&mut s, &[det_at(150)]);
        assert!(upd.crossings.is_empty());
    }

    #[test]
    fn validate_catches_reused_ids() {
        let mut s = scene(400);
        step(&mut s, &[det_at(100), det_at(200)]);
        assert!(s.validate().is_ok());

        let mut stale = s.clone();
        stale.next_id = 1;
        assert!(matches!(stale.validate(), Err(Error::InvalidCheckpoint(_))));

        let mut swapped = s.clone();
        swapped.tracks.swap(0, 1);
        assert!(swapped.validate().is_err());

        let mut half_counted = s;
        half_counted.tracks[0].counted = true;
        assert!(half_counted.validate().is_err());
    }

    #[test]
    fn track_limit_drops_new_detections() {
        let config = CounterConfig {
            max_tracked_objects: 2,
            ..Default::default()
        };
        let mut s = Scene::new(400, &config);

        let upd = step(&mut s, &[det_at(100), det_at(200), det_at(300)]);

        assert_eq!(upd.ids, vec![Some(0), Some(1), None]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.next_id(), 2);
    }
}
