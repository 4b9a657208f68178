use std::collections::HashMap;

/// Derives a rescue (triage) level from how long an object has been
/// continuously observed in a fallen pose (4.8), grounded directly in the
/// original's `update_fall_level`: while fallen, the level climbs with
/// elapsed seconds, capped at `max_level`; the moment the object is no
/// longer observed as fallen its entry is dropped entirely (not reset to a
/// stored zero), so a later fall starts the climb over from 1.
pub struct RescueEstimator {
    max_level: u32,
    fallen_since_ms: HashMap<String, i64>,
}

impl RescueEstimator {
    pub fn new(max_level: u32) -> Self {
        RescueEstimator {
            max_level,
            fallen_since_ms: HashMap::new(),
        }
    }

    /// Returns `Some(level)` while `object_id` is fallen, `None` otherwise.
    pub fn update(&mut self, object_id: &str, is_fallen: bool, now_ms: i64) -> Option<u32> {
        if !is_fallen {
            self.fallen_since_ms.remove(object_id);
            return None;
        }
        let since = *self
            .fallen_since_ms
            .entry(object_id.to_string())
            .or_insert(now_ms);
        let elapsed_s = ((now_ms - since).max(0) / 1000) as u32;
        Some((elapsed_s + 1).min(self.max_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_climbs_with_elapsed_seconds_while_fallen() {
        let mut est = RescueEstimator::new(10);
        assert_eq!(est.update("obj1", true, 0), Some(1));
        assert_eq!(est.update("obj1", true, 500), Some(1));
        assert_eq!(est.update("obj1", true, 1_000), Some(2));
        assert_eq!(est.update("obj1", true, 3_500), Some(4));
    }

    #[test]
    fn level_is_capped_at_max() {
        let mut est = RescueEstimator::new(3);
        assert_eq!(est.update("obj1", true, 0), Some(1));
        assert_eq!(est.update("obj1", true, 10_000), Some(3));
    }

    #[test]
    fn standing_back_up_clears_the_entry_not_resets_to_zero() {
        let mut est = RescueEstimator::new(10);
        assert_eq!(est.update("obj1", true, 2_000), Some(3));
        assert_eq!(est.update("obj1", false, 2_500), None);
        // falling again later restarts the climb from 1, not from where it left off
        assert_eq!(est.update("obj1", true, 2_600), Some(1));
    }

    #[test]
    fn objects_are_tracked_independently() {
        let mut est = RescueEstimator::new(10);
        est.update("a", true, 0);
        est.update("b", true, 5_000);
        assert_eq!(est.update("a", true, 1_000), Some(2));
        assert_eq!(est.update("b", true, 5_000), Some(1));
    }
}
