use indexmap::IndexMap;
use serde::Serialize;

use crate::interaction::InteractionGraph;
use crate::partition::StructuralComponent;
use crate::structs::{Alignment, AlignmentRecord, Structure};

/// The partitioned structural motif of one seed alignment.
///
/// The default value is the empty motif left in the slot of
/// a record that was skipped or failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Motif {
    pub header: IndexMap<String, String>,
    pub seed_alignment: Alignment,
    /// One per sequence, in the order of the seed alignment rows
    pub interaction_graphs: Vec<InteractionGraph>,
    /// One per sequence, matching `interaction_graphs`
    pub interaction_pairs: Vec<Vec<(usize, usize)>>,
    pub consensus_structure: Structure,
    pub partition: Vec<StructuralComponent>,
}

impl Motif {
    pub fn assemble(
        record: &AlignmentRecord,
        interactions: Vec<(InteractionGraph, Vec<(usize, usize)>)>,
        consensus_structure: Structure,
        partition: Vec<StructuralComponent>,
    ) -> Self {
        let (interaction_graphs, interaction_pairs) = interactions.into_iter().unzip();

        Self {
            header: record.header.clone(),
            seed_alignment: record.alignment.clone(),
            interaction_graphs,
            interaction_pairs,
            consensus_structure,
            partition,
        }
    }

    /// Returns true for the placeholder motif of a record that produced nothing.
    pub fn is_empty(&self) -> bool {
        self.seed_alignment.rows.is_empty() && self.consensus_structure.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::build_interactions;
    use crate::partition::partition_structure;
    use assert2::check;

    #[test]
    fn test_assemble() -> anyhow::Result<()> {
        let record = AlignmentRecord::new(
            [("AC".to_string(), "RF99999".to_string())].into_iter().collect(),
            [
                ("a".to_string(), "GGAAACC".to_string()),
                ("b".to_string(), "GG-AACC".to_string()),
            ]
            .into_iter()
            .collect(),
            IndexMap::new(),
        )?;
        let structure = Structure::from_bracket("((...))")?;

        let interactions = record
            .sequences
            .values()
            .map(|s| build_interactions(s, Some(&structure)))
            .collect();
        let partition = partition_structure(&structure);
        let motif = Motif::assemble(&record, interactions, structure.clone(), partition);

        check!(!motif.is_empty());
        check!(motif.header["AC"] == "RF99999");
        check!(motif.interaction_graphs.len() == 2);
        check!(motif.interaction_pairs[1] == vec![(0, 5), (1, 4)]);
        check!(motif.consensus_structure == structure);
        check!(motif.partition.len() == 1);
        check!(Motif::default().is_empty());
        Ok(())
    }
}
