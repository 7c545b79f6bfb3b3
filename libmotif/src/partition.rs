use serde::Serialize;

use crate::structs::structure::BasePair;
use crate::structs::Structure;

/// The kind of loop closed by the innermost pair of a stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopKind {
    /// No stems inside
    Hairpin,
    /// Exactly one stem inside; bulges included
    Interior,
    /// Two or more stems inside
    Multi,
}

/// A maximal run of stacked pairs and everything nested inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stem {
    /// Outermost pair first; each pair directly stacks on the one before
    pub pairs: Vec<BasePair>,
    pub loop_kind: LoopKind,
    /// The stems inside the closing loop, ordered by position
    pub children: Vec<Stem>,
}

impl Stem {
    pub fn outer(&self) -> &BasePair {
        // a stem is never built without a pair
        &self.pairs[0]
    }

    pub fn inner(&self) -> &BasePair {
        &self.pairs[self.pairs.len() - 1]
    }

    /// The number of pairs in this stem and every stem nested in it.
    pub fn total_pairs(&self) -> usize {
        self.pairs.len() + self.children.iter().map(|c| c.total_pairs()).sum::<usize>()
    }
}

/// One independently indexable piece of a structure.
///
/// Components are separated from each other by unpaired runs
/// that no pair spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralComponent {
    /// First column, always the left end of a pair
    pub start: usize,
    /// Last column, inclusive, always the right end of a pair
    pub end: usize,
    /// Every pair within the span, ordered by left position
    pub pairs: Vec<BasePair>,
    /// The nested (class 0) pairs, grouped into stems
    pub stems: Vec<Stem>,
    /// The pairs of every higher class
    pub pseudoknot_pairs: Vec<BasePair>,
}

impl StructuralComponent {
    pub fn has_pseudoknot(&self) -> bool {
        !self.pseudoknot_pairs.is_empty()
    }
}

/// Split a structure into its structural components.
///
/// The span of every pair is covered, and spans that overlap or touch are
/// merged, so the components are disjoint, cover exactly the paired and
/// enclosed columns, and come out ordered by start column. A structure
/// with no pairs has no components.
pub fn partition_structure(structure: &Structure) -> Vec<StructuralComponent> {
    let mut spans: Vec<(usize, usize)> = vec![];

    // pairs() is ordered by left position
    for pair in structure.pairs() {
        match spans.last_mut() {
            Some((_, end)) if pair.left <= *end + 1 => *end = (*end).max(pair.right),
            _ => spans.push((pair.left, pair.right)),
        }
    }

    let mut nested_partners: Vec<Option<usize>> = vec![None; structure.len()];
    structure
        .pairs()
        .iter()
        .filter(|p| p.class == 0)
        .for_each(|p| {
            nested_partners[p.left] = Some(p.right);
            nested_partners[p.right] = Some(p.left);
        });

    let mut pairs = structure.pairs().iter().peekable();

    spans
        .into_iter()
        .map(|(start, end)| {
            let mut component_pairs = vec![];
            while let Some(pair) = pairs.next_if(|p| p.left <= end) {
                component_pairs.push(*pair);
            }

            let pseudoknot_pairs = component_pairs
                .iter()
                .filter(|p| p.class > 0)
                .copied()
                .collect();

            StructuralComponent {
                start,
                end,
                stems: collect_stems(&nested_partners, start, end),
                pairs: component_pairs,
                pseudoknot_pairs,
            }
        })
        .collect()
}

/// Collect the outermost stems found in the columns `start..=end`.
fn collect_stems(partners: &[Option<usize>], start: usize, end: usize) -> Vec<Stem> {
    let mut stems = vec![];
    let mut position = start;

    while position <= end {
        match partners[position] {
            Some(right) if right > position && right <= end => {
                stems.push(build_stem(partners, position, right));
                position = right + 1;
            }
            _ => position += 1,
        }
    }

    stems
}

fn build_stem(partners: &[Option<usize>], left: usize, right: usize) -> Stem {
    let mut pairs = vec![BasePair::new(left, right)];
    let (mut i, mut j) = (left, right);

    while i + 1 < j - 1 && partners[i + 1] == Some(j - 1) {
        i += 1;
        j -= 1;
        pairs.push(BasePair::new(i, j));
    }

    let children = if i + 1 < j {
        collect_stems(partners, i + 1, j - 1)
    } else {
        vec![]
    };

    let loop_kind = match children.len() {
        0 => LoopKind::Hairpin,
        1 => LoopKind::Interior,
        _ => LoopKind::Multi,
    };

    Stem {
        pairs,
        loop_kind,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    #[test]
    fn test_no_pairs_no_components() -> anyhow::Result<()> {
        check!(partition_structure(&Structure::from_bracket("..........")?).is_empty());
        check!(partition_structure(&Structure::unpaired(0)).is_empty());
        Ok(())
    }

    #[test]
    fn test_single_hairpin() -> anyhow::Result<()> {
        let components = partition_structure(&Structure::from_bracket("((...))")?);

        let_assert!([component] = components.as_slice());
        check!((component.start, component.end) == (0, 6));
        check!(component.pairs.len() == 2);
        let_assert!([stem] = component.stems.as_slice());
        check!(stem.pairs.len() == 2);
        check!(stem.loop_kind == LoopKind::Hairpin);
        check!((stem.inner().left, stem.inner().right) == (1, 5));
        Ok(())
    }

    #[test]
    fn test_split_at_exterior_runs() -> anyhow::Result<()> {
        let components = partition_structure(&Structure::from_bracket("..((...))...(((...)))..")?);

        check!(components.len() == 2);
        check!((components[0].start, components[0].end) == (2, 8));
        check!((components[1].start, components[1].end) == (12, 20));
        Ok(())
    }

    #[test]
    fn test_touching_spans_merge() -> anyhow::Result<()> {
        let components = partition_structure(&Structure::from_bracket("(...)(...)")?);

        let_assert!([component] = components.as_slice());
        check!((component.start, component.end) == (0, 9));
        check!(component.stems.len() == 2);
        Ok(())
    }

    #[test]
    fn test_nested_loops() -> anyhow::Result<()> {
        let components =
            partition_structure(&Structure::from_bracket("((..((...))..((...))..))..((.((...)).))")?);

        check!(components.len() == 2);

        let_assert!([multi] = components[0].stems.as_slice());
        check!(multi.loop_kind == LoopKind::Multi);
        check!(multi.children.len() == 2);
        check!(multi.total_pairs() == 6);

        let_assert!([interior] = components[1].stems.as_slice());
        check!(interior.loop_kind == LoopKind::Interior);
        let_assert!([hairpin] = interior.children.as_slice());
        check!(hairpin.loop_kind == LoopKind::Hairpin);
        check!((hairpin.outer().left, hairpin.outer().right) == (29, 35));
        Ok(())
    }

    #[test]
    fn test_pseudoknot_stays_in_one_component() -> anyhow::Result<()> {
        let components = partition_structure(&Structure::from_bracket("((..[[..))..]]...(...)")?);

        check!(components.len() == 2);
        check!((components[0].start, components[0].end) == (0, 13));
        check!(components[0].has_pseudoknot());
        check!(components[0].pseudoknot_pairs.len() == 2);
        check!(components[0].stems.len() == 1);
        check!(!components[1].has_pseudoknot());
        Ok(())
    }

    fn random_structure(rng: &mut Pcg64) -> Structure {
        let length = rng.gen_range(0..80);
        let mut partners = vec![false; length];
        let mut pairs = vec![];

        if length >= 2 {
            for _ in 0..rng.gen_range(0..8) {
                let left = rng.gen_range(0..length - 1);
                let right = rng.gen_range(left + 1..length);
                if !partners[left] && !partners[right] {
                    partners[left] = true;
                    partners[right] = true;
                    pairs.push((left, right));
                }
            }
        }

        Structure::from_pairs(length, pairs).unwrap()
    }

    #[test]
    fn test_random_partitions_cover_without_overlap() {
        let mut rng = Pcg64::seed_from_u64(11);

        for _ in 0..300 {
            let structure = random_structure(&mut rng);
            let components = partition_structure(&structure);

            // ordered and disjoint, with at least one unpaired column between neighbours
            for window in components.windows(2) {
                check!(window[0].end + 1 < window[1].start);
            }

            // exactly the columns under some pair are covered
            for column in 0..structure.len() {
                let spanned = structure
                    .pairs()
                    .iter()
                    .any(|p| p.left <= column && column <= p.right);
                let covering = components
                    .iter()
                    .filter(|c| c.start <= column && column <= c.end)
                    .count();
                check!(covering == spanned as usize);
            }

            // every pair lands in the component that spans it
            let total: usize = components.iter().map(|c| c.pairs.len()).sum();
            check!(total == structure.pair_count());
            for component in components.iter() {
                for pair in component.pairs.iter() {
                    check!(component.start <= pair.left && pair.right <= component.end);
                }
                let nested: usize = component.stems.iter().map(|s| s.total_pairs()).sum();
                check!(nested + component.pseudoknot_pairs.len() == component.pairs.len());
            }
        }
    }
}
