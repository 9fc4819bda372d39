use crate::error::{GamificationError, Result};
use crate::models::LevelInfo;

/// One entry of the level progression ladder.
#[derive(Debug, Clone, Copy)]
pub struct LevelThreshold {
    pub level: i32,
    pub min_xp: i64,
}

/// The XP-to-level ladder. Passed into the engine explicitly so tests can
/// swap in a smaller table; never exposed as a module-level singleton.
#[derive(Debug, Clone)]
pub struct LevelTable {
    thresholds: Vec<LevelThreshold>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            thresholds: vec![
                LevelThreshold { level: 1, min_xp: 0 },
                LevelThreshold { level: 2, min_xp: 100 },
                LevelThreshold { level: 3, min_xp: 250 },
                LevelThreshold { level: 4, min_xp: 500 },
                LevelThreshold { level: 5, min_xp: 1000 },
                LevelThreshold { level: 6, min_xp: 2000 },
                LevelThreshold { level: 7, min_xp: 3500 },
                LevelThreshold { level: 8, min_xp: 5500 },
                LevelThreshold { level: 9, min_xp: 8000 },
                LevelThreshold { level: 10, min_xp: 12000 },
            ],
        }
    }
}

impl LevelTable {
    pub fn new(thresholds: Vec<LevelThreshold>) -> Result<Self> {
        let table = Self { thresholds };
        table.validate()?;
        Ok(table)
    }

    /// The ladder must start at (1, 0) and be strictly increasing in both
    /// level and minimum XP, so every non-negative total maps to exactly
    /// one level.
    fn validate(&self) -> Result<()> {
        let first = self.thresholds.first().ok_or_else(|| {
            GamificationError::InvalidArgument("level table is empty".into())
        })?;
        if first.level != 1 || first.min_xp != 0 {
            return Err(GamificationError::InvalidArgument(
                "level table must start at level 1 with threshold 0".into(),
            ));
        }
        for pair in self.thresholds.windows(2) {
            if pair[1].level <= pair[0].level || pair[1].min_xp <= pair[0].min_xp {
                return Err(GamificationError::InvalidArgument(
                    "level table must be strictly increasing".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn max_level(&self) -> i32 {
        self.thresholds.last().map(|t| t.level).unwrap_or(1)
    }

    /// Highest threshold not exceeding the total wins. The (1, 0) entry
    /// guarantees a match for any total >= 0.
    pub fn level_for_xp(&self, total_xp: i64) -> i32 {
        self.thresholds
            .iter()
            .rev()
            .find(|t| total_xp >= t.min_xp)
            .map(|t| t.level)
            .unwrap_or(1)
    }

    /// Level plus progress toward the next one. Past the top of the ladder
    /// the student pins at max level with a full progress bar.
    pub fn level_info(&self, total_xp: i64) -> LevelInfo {
        let level = self.level_for_xp(total_xp);
        let current = self
            .thresholds
            .iter()
            .find(|t| t.level == level)
            .map(|t| t.min_xp)
            .unwrap_or(0);
        let next = self
            .thresholds
            .iter()
            .find(|t| t.level == level + 1)
            .map(|t| t.min_xp);

        let (progress_percent, experience_to_next) = match next {
            Some(next_xp) => {
                let span = (next_xp - current) as f64;
                let gained = (total_xp - current) as f64;
                let percent = (100.0 * gained / span).round() as i32;
                (percent.clamp(0, 100), (next_xp - total_xp).max(0))
            }
            None => (100, 0),
        };

        LevelInfo {
            level,
            current_level_threshold: current,
            next_level_threshold: next,
            progress_percent,
            experience_to_next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table() -> LevelTable {
        LevelTable::new(vec![
            LevelThreshold { level: 1, min_xp: 0 },
            LevelThreshold { level: 2, min_xp: 100 },
            LevelThreshold { level: 3, min_xp: 250 },
        ])
        .unwrap()
    }

    #[test]
    fn level_matches_highest_threshold() {
        let table = LevelTable::default();
        assert_eq!(table.level_for_xp(0), 1);
        assert_eq!(table.level_for_xp(99), 1);
        assert_eq!(table.level_for_xp(100), 2);
        assert_eq!(table.level_for_xp(11999), 9);
        assert_eq!(table.level_for_xp(12000), 10);
        assert_eq!(table.level_for_xp(1_000_000), 10);
    }

    #[test]
    fn progress_midway_through_a_level() {
        let info = small_table().level_info(150);
        assert_eq!(info.level, 2);
        assert_eq!(info.next_level_threshold, Some(250));
        assert_eq!(info.experience_to_next, 100);
        assert_eq!(info.progress_percent, 33);
    }

    #[test]
    fn progress_at_exact_threshold() {
        let info = small_table().level_info(100);
        assert_eq!(info.level, 2);
        assert_eq!(info.progress_percent, 0);
        assert_eq!(info.experience_to_next, 150);
    }

    #[test]
    fn pinned_at_max_level() {
        let info = small_table().level_info(9000);
        assert_eq!(info.level, 3);
        assert_eq!(info.next_level_threshold, None);
        assert_eq!(info.progress_percent, 100);
        assert_eq!(info.experience_to_next, 0);
    }

    #[test]
    fn progress_stays_in_bounds() {
        let table = LevelTable::default();
        for xp in [0, 1, 50, 100, 249, 250, 999, 5499, 12000, 99999] {
            let info = table.level_info(xp);
            assert!(info.level >= 1);
            assert!((0..=100).contains(&info.progress_percent), "xp={xp}");
        }
    }

    #[test]
    fn rejects_malformed_tables() {
        assert!(LevelTable::new(vec![]).is_err());
        assert!(LevelTable::new(vec![LevelThreshold { level: 1, min_xp: 50 }]).is_err());
        assert!(LevelTable::new(vec![
            LevelThreshold { level: 1, min_xp: 0 },
            LevelThreshold { level: 2, min_xp: 0 },
        ])
        .is_err());
    }
}
