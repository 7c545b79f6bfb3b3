//! Per-sequence base pairing graphs.

use petgraph::graph::{NodeIndex, UnGraph};

use crate::alphabet::{is_gap, PairType};
use crate::structs::Structure;
use crate::util::ungapped_indices;

/// Nodes are the ungapped residues of one sequence, weighted with
/// their residue byte; edges are the base pairs between them.
pub type InteractionGraph = UnGraph<u8, ()>;

/// Build the pairing graph of one aligned sequence and its pair list.
///
/// `structure` is given in alignment columns. A column pair becomes an edge
/// only when both columns hold unambiguous residues of this sequence that
/// form a canonical pair; pairs landing on gaps or degenerate symbols are
/// dropped. The pair list holds the edges as ungapped indices, ordered by
/// left index. Without a structure the graph has no edges.
pub fn build_interactions(
    sequence: &str,
    structure: Option<&Structure>,
) -> (InteractionGraph, Vec<(usize, usize)>) {
    let bytes = sequence.as_bytes();
    let mut graph = InteractionGraph::default();

    let residue_idx = ungapped_indices(bytes);
    bytes
        .iter()
        .filter(|&&b| !is_gap(b))
        .for_each(|&b| {
            graph.add_node(b);
        });

    let mut pairs: Vec<(usize, usize)> = vec![];

    if let Some(structure) = structure {
        for pair in structure.pairs() {
            let (Some(&left_byte), Some(&right_byte)) = (bytes.get(pair.left), bytes.get(pair.right))
            else {
                continue;
            };
            if PairType::from_utf8(left_byte, right_byte).is_none() {
                continue;
            }
            // a canonical pair is never a gap, so both columns map to residues
            if let (Some(left), Some(right)) = (residue_idx[pair.left], residue_idx[pair.right]) {
                graph.add_edge(NodeIndex::new(left), NodeIndex::new(right), ());
                pairs.push((left, right));
            }
        }
    }

    (graph, pairs)
}
