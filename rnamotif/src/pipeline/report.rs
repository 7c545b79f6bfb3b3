use std::fmt::{Display, Formatter};
use std::time::Duration;

use derive_builder::Builder;
use log::info;
use strum::{EnumCount, IntoEnumIterator};

use super::{MotifSlot, RecordState};

/// What it took to turn one record into a motif.
#[derive(Builder, Default, Debug, Clone)]
#[builder(setter(strip_option), default)]
pub struct RecordStats {
    /// Alignment columns
    pub width: usize,
    pub sequences: usize,
    /// Pairs in the consensus structure
    pub pairs: usize,
    /// Structural components in the partition
    pub components: usize,
    pub pseudoknotted_components: usize,
    pub fold_time: Duration,
}

/// The outcome counts of a whole run.
#[derive(Default, Debug, Clone)]
pub struct RunReport {
    counts: [usize; RecordState::COUNT],
    fold_time: Duration,
}

impl RunReport {
    pub fn from_slots(slots: &[MotifSlot]) -> Self {
        let mut report = Self::default();

        slots.iter().for_each(|slot| {
            report.counts[slot.state as usize] += 1;
            report.fold_time += slot.stats.fold_time;
        });

        report
    }

    pub fn count(&self, state: RecordState) -> usize {
        self.counts[state as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn log(&self, elapsed: Duration) {
        info!("{self}");
        info!(
            "total time: {:.3}s ({:.3}s folding)",
            elapsed.as_secs_f64(),
            self.fold_time.as_secs_f64()
        );
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<String> = RecordState::iter()
            .filter(|state| state.is_final() || self.count(*state) > 0)
            .map(|state| format!("{} {state}", self.count(state)))
            .collect();

        write!(f, "{} records: {}", self.total(), counts.join(", "))
    }
}
