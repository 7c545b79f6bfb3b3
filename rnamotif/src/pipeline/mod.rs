mod report;
pub use report::*;

use std::time::Instant;

use log::{debug, info, warn};
use rayon::iter::{
    IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator, ParallelIterator,
};
use serde::Serialize;
use strum::{Display, EnumCount, EnumIter};
use thiserror::Error;

use libmotif::fold::{FoldError, FoldingStrategy};
use libmotif::interaction::build_interactions;
use libmotif::notation::parse_constraint;
use libmotif::partition::partition_structure;
use libmotif::structs::alignment::{
    MissingAnnotationKeyError, ACCESSION_KEY, CONSENSUS_STRUCTURE_KEY, IDENTIFIER_KEY,
};
use libmotif::structs::structure::MalformedAnnotationError;
use libmotif::structs::{AlignmentRecord, Motif};

pub const DEFAULT_MAX_LENGTH: usize = 1000;

/// Where one record is in its trip through the pipeline.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumCount, EnumIter, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Pending,
    Processing,
    Completed,
    Skipped,
    Failed,
}

impl RecordState {
    /// Returns true once a record can't change state anymore.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            RecordState::Completed | RecordState::Skipped | RecordState::Failed
        )
    }
}

/// Everything that stops one record from producing a motif.
///
/// None of these abort the run: the record's slot keeps an empty motif.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("representative sequence has length {length}, above the limit of {max_length}")]
    SkippedTooLong { length: usize, max_length: usize },
    #[error(transparent)]
    MalformedAnnotation(#[from] MalformedAnnotationError),
    #[error(transparent)]
    MissingAnnotationKey(#[from] MissingAnnotationKeyError),
    #[error(transparent)]
    Fold(#[from] FoldError),
}

/// The reserved output position of one record.
#[derive(Debug, Clone)]
pub struct MotifSlot {
    pub label: String,
    pub state: RecordState,
    pub motif: Motif,
    pub error: Option<String>,
    pub stats: RecordStats,
}

impl MotifSlot {
    pub fn new(label: String) -> Self {
        Self {
            label,
            state: RecordState::Pending,
            motif: Motif::default(),
            error: None,
            stats: RecordStats::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Force the seed consensus structure on every prediction
    pub constrain: bool,
    /// Records whose representative sequence is longer are skipped
    pub max_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            constrain: false,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    pub config: PipelineConfig,
    pub folding: Box<dyn FoldingStrategy>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, folding: Box<dyn FoldingStrategy>) -> Self {
        Self { config, folding }
    }

    /// Turn one record into its motif.
    pub fn process_record(
        &self,
        record: &AlignmentRecord,
    ) -> Result<(Motif, RecordStats), RecordError> {
        record.header_value(ACCESSION_KEY)?;
        record.header_value(IDENTIFIER_KEY)?;

        let mut stats = RecordStatsBuilder::default();
        stats
            .width(record.width())
            .sequences(record.alignment.num_rows());

        let length = record.representative_length();
        if length > self.config.max_length {
            return Err(RecordError::SkippedTooLong {
                length,
                max_length: self.config.max_length,
            });
        }

        let constraint = if self.config.constrain {
            let annotation = record.column_annotation_value(CONSENSUS_STRUCTURE_KEY)?;
            Some(parse_constraint(annotation)?)
        } else {
            None
        };

        let now = Instant::now();
        let consensus_structure = self.folding.fold(&record.alignment, constraint.as_ref())?;
        stats.fold_time(now.elapsed());

        let interactions: Vec<_> = record
            .sequences
            .values()
            .map(|sequence| build_interactions(sequence, Some(&consensus_structure)))
            .collect();

        let partition = partition_structure(&consensus_structure);

        stats
            .pairs(consensus_structure.pair_count())
            .components(partition.len())
            .pseudoknotted_components(partition.iter().filter(|c| c.has_pseudoknot()).count());

        let motif = Motif::assemble(record, interactions, consensus_structure, partition);
        Ok((motif, stats.build().unwrap_or_default()))
    }

    /// Process one record into its slot, moving the slot to its final state.
    pub fn fill_slot(&self, slot: &mut MotifSlot, record: &AlignmentRecord) {
        slot.state = RecordState::Processing;
        debug!("{}: processing", slot.label);

        match self.process_record(record) {
            Ok((motif, stats)) => {
                debug!(
                    "{}: {} pairs in {} components ({} pseudoknotted), folded in {:.3}s",
                    slot.label,
                    stats.pairs,
                    stats.components,
                    stats.pseudoknotted_components,
                    stats.fold_time.as_secs_f64()
                );
                slot.motif = motif;
                slot.stats = stats;
                slot.state = RecordState::Completed;
            }
            Err(err @ RecordError::SkippedTooLong { .. }) => {
                info!("{}: skipping, {err}", slot.label);
                slot.error = Some(err.to_string());
                slot.state = RecordState::Skipped;
            }
            Err(err) => {
                warn!("{}: failed, {err}", slot.label);
                slot.error = Some(err.to_string());
                slot.state = RecordState::Failed;
            }
        }
    }
}

/// The label a record is logged and written under.
///
/// A record without its AC or ID still gets a label here;
/// it fails later, in [`Pipeline::process_record`].
pub fn record_label(index: usize, record: &AlignmentRecord) -> String {
    record.label().unwrap_or_else(|| format!("record {index}"))
}

fn allocate_slots(records: &[AlignmentRecord]) -> Vec<MotifSlot> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| MotifSlot::new(record_label(index, record)))
        .collect()
}

/// Process every record on the global thread pool.
///
/// Each task writes only its own slot, so the output
/// is in input order whatever order the tasks finish in.
pub fn run_pipeline(records: &[AlignmentRecord], pipeline: &Pipeline) -> Vec<MotifSlot> {
    let mut slots = allocate_slots(records);

    slots
        .par_iter_mut()
        .zip(records.par_iter())
        .panic_fuse()
        .for_each(|(slot, record)| pipeline.fill_slot(slot, record));

    slots
}

/// Process every record on the calling thread.
pub fn run_pipeline_serial(records: &[AlignmentRecord], pipeline: &Pipeline) -> Vec<MotifSlot> {
    let mut slots = allocate_slots(records);

    slots
        .iter_mut()
        .zip(records.iter())
        .for_each(|(slot, record)| pipeline.fill_slot(slot, record));

    slots
}
