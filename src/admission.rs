//! TinyLFU admission filter: a doorkeeper bloom filter gates one-off keys
//! from ever touching the count-min sketch, which tracks approximate access
//! frequency for everything that has been seen at least twice. Owned
//! exclusively by the eviction policy, which serializes access with its own
//! mutex — mirrors the original `tinyLFU` struct's non-thread-safe design.

use crate::bloom::Bloom;
use crate::sketch::Sketch;

pub struct TinyLfu {
    sketch: Sketch,
    door: Bloom,
    incrs: u64,
    reset_at: u64,
}

impl TinyLfu {
    pub fn new(num_counters: usize) -> Self {
        Self {
            sketch: Sketch::new(num_counters),
            door: Bloom::new(num_counters, 0.01),
            incrs: 0,
            reset_at: num_counters as u64,
        }
    }

    /// Returns the approximate access frequency of `h`: the sketch's count
    /// plus a flat +1 bonus once the doorkeeper has seen `h`. The bonus is
    /// additive, not gating — the sketch value still counts even right after
    /// an aging reset clears the doorkeeper bit.
    pub fn estimate(&self, h: u64) -> u8 {
        let bonus = if self.door.probably_seen(h) { 1 } else { 0 };
        self.sketch.estimate(h).saturating_add(bonus)
    }

    /// Records one access of `h`. The first access only flips the
    /// doorkeeper bit; the sketch itself is incremented from the second
    /// access onward. `estimate` still reports 1 after a single access,
    /// since a set doorkeeper bit is worth +1 on its own. `incrs` counts
    /// every call regardless of whether the sketch was touched, and aging
    /// fires once it reaches `reset_at`.
    pub fn increment(&mut self, h: u64) {
        if !self.door.add_if_not_has(h) {
            self.sketch.increment(h);
        }
        self.incrs += 1;
        if self.incrs >= self.reset_at {
            self.reset();
        }
    }

    /// Records a batch pushed by the admission-push worker.
    pub fn push(&mut self, keys: &[u64]) {
        for &h in keys {
            self.increment(h);
        }
    }

    /// Halves the sketch and clears the doorkeeper, the aging step that
    /// keeps frequency estimates representative of recent traffic rather
    /// than all-time traffic.
    fn reset(&mut self) {
        self.sketch.reset();
        self.door.clear();
        self.incrs = 0;
    }

    pub fn clear(&mut self) {
        self.sketch.clear();
        self.door.clear();
        self.incrs = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_key_estimates_zero() {
        let t = TinyLfu::new(64);
        assert_eq!(t.estimate(7), 0);
    }

    #[test]
    fn first_increment_only_opens_the_doorkeeper() {
        let mut t = TinyLfu::new(64);
        t.increment(7);
        // the doorkeeper bit alone is worth +1; the sketch itself is still untouched
        assert_eq!(t.estimate(7), 1);
    }

    #[test]
    fn second_increment_raises_the_sketch() {
        let mut t = TinyLfu::new(64);
        t.increment(7);
        t.increment(7);
        assert!(t.estimate(7) >= 2);
    }

    #[test]
    fn push_feeds_a_batch_of_keys() {
        let mut t = TinyLfu::new(64);
        t.push(&[7, 7, 7]);
        assert!(t.estimate(7) >= 1);
    }

    #[test]
    fn aging_resets_after_reset_at_increments() {
        let mut t = TinyLfu::new(4);
        for i in 0..64u64 {
            t.increment(i);
            t.increment(i);
        }
        assert!(t.incrs < t.reset_at, "aging should have fired at least once");
    }

    #[test]
    fn four_counters_crosses_the_reset_threshold_on_the_fourth_increment() {
        let mut t = TinyLfu::new(4);
        t.increment(1);
        assert!(t.door.probably_seen(1));
        assert_eq!(t.sketch.estimate(1), 0);
        assert_eq!(t.estimate(1), 1);

        t.increment(1);
        t.increment(1);
        assert_eq!(t.sketch.estimate(1), 2);
        assert_eq!(t.estimate(1), 3);

        // the fourth call pushes incrs to reset_at: the sketch is halved and
        // the doorkeeper is cleared in the same call, but the halved sketch
        // value still counts since the bonus is additive, not gating.
        t.increment(1);
        assert_eq!(t.sketch.estimate(1), 1);
        assert_eq!(t.estimate(1), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut t = TinyLfu::new(64);
        t.increment(7);
        t.increment(7);
        t.clear();
        assert_eq!(t.estimate(7), 0);
    }
}
