use std::collections::HashMap;

use falcon_types::CameraId;

/// Builds a stable object id the way the original detector did:
/// the capture-time millisecond timestamp concatenated with the detector's
/// own (per-camera, per-run) transient track id.
pub fn generate_object_id(instant_ms: i64, transient_track_id: i64) -> String {
    format!("{instant_ms}{transient_track_id}")
}

#[derive(Debug, Clone)]
struct TrackEntry {
    object_id: String,
    misses: u32,
}

/// Assigns stable object ids to per-frame detector output (4.6).
///
/// Deliberately not a motion-model tracker: FALCON only needs to recognize
/// "this is the same object the detector was already tracking" and evict
/// ids the detector has stopped reporting, not to estimate position between
/// observations.
pub struct Tracker {
    lost_threshold: u32,
    table: HashMap<(CameraId, i64), TrackEntry>,
    /// Counter used to mint distinct ids for detections the detector did
    /// not itself track (no transient id), so each still gets a usable
    /// object id even though it cannot be re-identified across frames.
    untracked_counter: i64,
}

impl Tracker {
    pub fn new(lost_threshold: u32) -> Self {
        Tracker {
            lost_threshold,
            table: HashMap::new(),
            untracked_counter: 0,
        }
    }

    /// Assigns or reuses a stable object id for one detection within one
    /// camera's batch. Call [`Tracker::evict_unseen`] once per batch after
    /// processing every detection in it.
    pub fn assign(&mut self, camera_id: CameraId, transient_track_id: Option<i64>, instant_ms: i64) -> String {
        match transient_track_id {
            Some(tid) => {
                let key = (camera_id, tid);
                if let Some(entry) = self.table.get_mut(&key) {
                    entry.misses = 0;
                    entry.object_id.clone()
                } else {
                    let object_id = generate_object_id(instant_ms, tid);
                    self.table.insert(
                        key,
                        TrackEntry {
                            object_id: object_id.clone(),
                            misses: 0,
                        },
                    );
                    object_id
                }
            }
            None => {
                self.untracked_counter += 1;
                generate_object_id(instant_ms, -self.untracked_counter)
            }
        }
    }

    /// Call once per camera batch after every detection in it has called
    /// [`Tracker::assign`]: ages out any tracked id not touched this batch
    /// for more than `lost_threshold` consecutive batches.
    pub fn evict_unseen(&mut self, camera_id: CameraId, seen_transient_ids: &[i64]) {
        let seen: std::collections::HashSet<i64> = seen_transient_ids.iter().copied().collect();
        self.table.retain(|(cam, tid), entry| {
            if *cam != camera_id {
                return true;
            }
            if seen.contains(tid) {
                return true;
            }
            entry.misses += 1;
            entry.misses <= self.lost_threshold
        });
    }

    pub fn active_count(&self, camera_id: CameraId) -> usize {
        self.table.keys().filter(|(cam, _)| *cam == camera_id).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cam() -> CameraId {
        CameraId::new("A").unwrap()
    }

    #[test]
    fn generate_object_id_concatenates_timestamp_and_tracker_id() {
        assert_eq!(generate_object_id(1_700_000_000_000, 7), "17000000000007");
    }

    #[test]
    fn same_transient_id_reuses_object_id_across_batches() {
        let mut t = Tracker::new(3);
        let id1 = t.assign(cam(), Some(5), 1_000);
        t.evict_unseen(cam(), &[5]);
        let id2 = t.assign(cam(), Some(5), 2_000);
        assert_eq!(id1, id2);
    }

    #[test]
    fn id_is_evicted_after_lost_threshold_misses() {
        let mut t = Tracker::new(2);
        t.assign(cam(), Some(9), 1_000);
        assert_eq!(t.active_count(cam()), 1);
        t.evict_unseen(cam(), &[]); // miss 1
        assert_eq!(t.active_count(cam()), 1);
        t.evict_unseen(cam(), &[]); // miss 2, still within threshold
        assert_eq!(t.active_count(cam()), 1);
        t.evict_unseen(cam(), &[]); // miss 3, exceeds threshold of 2
        assert_eq!(t.active_count(cam()), 0);
    }

    #[test]
    fn reappearing_before_eviction_resets_miss_count() {
        let mut t = Tracker::new(1);
        let id1 = t.assign(cam(), Some(2), 1_000);
        t.evict_unseen(cam(), &[]); // miss 1, at threshold
        let id2 = t.assign(cam(), Some(2), 1_500); // reappears, resets misses
        assert_eq!(id1, id2);
        t.evict_unseen(cam(), &[]);
        assert_eq!(t.active_count(cam()), 1);
    }

    #[test]
    fn untracked_detections_each_get_a_distinct_id() {
        let mut t = Tracker::new(3);
        let id1 = t.assign(cam(), None, 1_000);
        let id2 = t.assign(cam(), None, 1_000);
        assert_ne!(id1, id2);
    }

    #[test]
    fn cameras_do_not_share_transient_id_namespace() {
        let mut t = Tracker::new(3);
        let a = t.assign(CameraId::new("A").unwrap(), Some(1), 1_000);
        let b = t.assign(CameraId::new("B").unwrap(), Some(1), 1_000);
        assert_ne!(a, b);
    }
}
