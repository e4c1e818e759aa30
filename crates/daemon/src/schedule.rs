use modmirror_core::SweepMode;

/// Which sweep each scheduled run performs.
///
/// The first run after start-up is always full; after that every
/// `full_every`-th run is full and the others are incremental.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    full_every: u32,
}

impl Schedule {
    pub fn new(full_every: u32) -> Self {
        Self {
            full_every: full_every.max(1),
        }
    }

    /// Mode of the run with the given 0-based index.
    pub fn mode_for(&self, run_index: u64) -> SweepMode {
        if run_index % u64::from(self.full_every) == 0 {
            SweepMode::Full
        } else {
            SweepMode::Incremental
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_run_is_full() {
        assert_eq!(Schedule::new(16).mode_for(0), SweepMode::Full);
    }

    #[test]
    fn test_every_nth_run_is_full() {
        let schedule = Schedule::new(4);
        let modes: Vec<SweepMode> = (0..9).map(|i| schedule.mode_for(i)).collect();
        let full: Vec<usize> = modes
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == SweepMode::Full)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(full, vec![0, 4, 8]);
    }

    #[test]
    fn test_zero_means_always_full() {
        let schedule = Schedule::new(0);
        assert_eq!(schedule.mode_for(1), SweepMode::Full);
        assert_eq!(schedule.mode_for(2), SweepMode::Full);
    }
}
