use log::{debug, trace};

use super::energy::MIN_HAIRPIN;
use super::nested::fold_nested;
use super::{BackendFault, FoldError, FoldingStrategy, InfeasibleConstraintError};
use crate::structs::{Alignment, Structure};

const PSEUDOKNOT_BACKEND: &str = "pseudoknot fold";

pub const DEFAULT_MAX_LEVELS: usize = 2;

/// Hierarchical folding that allows pairs to cross.
///
/// Level one is a nested fold of the whole alignment. Every later level
/// folds only the columns that no lower level paired, so its pairs are
/// free to cross the pairs beneath it. A constraint pair of bracket class
/// `k` is forced at level `k + 1`, and the columns of higher class pairs
/// are held unpaired until their level comes.
#[derive(Clone)]
pub struct PseudoknotFold {
    /// Never zero
    max_levels: usize,
}

impl Default for PseudoknotFold {
    fn default() -> Self {
        Self {
            max_levels: DEFAULT_MAX_LEVELS,
        }
    }
}

impl PseudoknotFold {
    pub fn new(max_levels: usize) -> Self {
        Self {
            max_levels: max_levels.max(1),
        }
    }

    /// The number of levels to fold, which is raised to
    /// fit every bracket class of the constraint.
    pub fn levels(&self, constraint: Option<&Structure>) -> usize {
        let needed = constraint.map_or(0, |c| c.class_count());
        self.max_levels.max(needed)
    }
}

impl FoldingStrategy for PseudoknotFold {
    fn name(&self) -> &'static str {
        PSEUDOKNOT_BACKEND
    }

    fn predict(
        &self,
        alignment: &Alignment,
        constraint: Option<&Structure>,
    ) -> Result<Structure, FoldError> {
        let width = alignment.width;
        let levels = self.levels(constraint);

        // (left, right, class) of every constraint pair
        let constraint_pairs: Vec<(usize, usize, usize)> = constraint
            .map(|c| c.pairs().iter().map(|p| (p.left, p.right, p.class)).collect())
            .unwrap_or_default();

        for &(left, right, _) in constraint_pairs.iter() {
            if right - left - 1 < MIN_HAIRPIN {
                return Err(InfeasibleConstraintError::LoopTooShort { left, right }.into());
            }
        }

        let mut paired = vec![false; width];
        let mut pairs: Vec<(usize, usize)> = vec![];

        for level in 0..levels {
            // the columns still open at this level, in original coordinates
            let columns: Vec<usize> = (0..width).filter(|&c| !paired[c]).collect();

            let level_constraint: Vec<&(usize, usize, usize)> = constraint_pairs
                .iter()
                .filter(|&&(_, _, class)| class == level)
                .collect();

            if columns.len() < MIN_HAIRPIN + 2 && level_constraint.is_empty() {
                trace!("{PSEUDOKNOT_BACKEND}: stopping at level {level}, too few open columns");
                break;
            }

            let mut projected_idx: Vec<Option<usize>> = vec![None; width];
            columns
                .iter()
                .enumerate()
                .for_each(|(idx, &c)| projected_idx[c] = Some(idx));

            let mut forced: Vec<(usize, usize)> = vec![];
            for &&(left, right, _) in level_constraint.iter() {
                match (projected_idx[left], projected_idx[right]) {
                    (Some(l), Some(r)) => forced.push((l, r)),
                    // a lower level already took one of the columns
                    _ => {
                        return Err(InfeasibleConstraintError::NotReproduced {
                            backend: PSEUDOKNOT_BACKEND,
                            left,
                            right,
                        }
                        .into())
                    }
                }
            }

            let mut reserved = vec![false; columns.len()];
            constraint_pairs
                .iter()
                .filter(|&&(_, _, class)| class > level)
                .for_each(|&(left, right, _)| {
                    for c in [left, right] {
                        if let Some(idx) = projected_idx[c] {
                            reserved[idx] = true;
                        }
                    }
                });

            let projected = project(alignment, &columns);
            let level_pairs = fold_nested(&projected, &forced, &reserved)
                .map_err(|err| restore_coordinates(err, &columns))?;

            debug!(
                "{PSEUDOKNOT_BACKEND}: level {} paired {} of {} open columns",
                level + 1,
                level_pairs.len() * 2,
                columns.len()
            );

            for (l, r) in level_pairs {
                let (left, right) = (columns[l], columns[r]);
                paired[left] = true;
                paired[right] = true;
                pairs.push((left, right));
            }
        }

        Structure::from_pairs(width, pairs).map_err(|source| {
            BackendFault::InvalidStructure {
                backend: PSEUDOKNOT_BACKEND,
                source,
            }
            .into()
        })
    }
}

/// Produce an alignment made of the given columns only.
fn project(alignment: &Alignment, columns: &[usize]) -> Alignment {
    Alignment {
        width: columns.len(),
        rows: alignment
            .rows
            .iter()
            .map(|row| columns.iter().map(|&c| row[c]).collect())
            .collect(),
    }
}

/// Rewrite the columns named by a projected fold error as original columns.
fn restore_coordinates(err: FoldError, columns: &[usize]) -> FoldError {
    let restore = |idx: usize| columns.get(idx).copied().unwrap_or(idx);

    match err {
        FoldError::Infeasible(InfeasibleConstraintError::LoopTooShort { left, right }) => {
            InfeasibleConstraintError::LoopTooShort {
                left: restore(left),
                right: restore(right),
            }
            .into()
        }
        FoldError::Infeasible(InfeasibleConstraintError::Unpairable { left, right }) => {
            InfeasibleConstraintError::Unpairable {
                left: restore(left),
                right: restore(right),
            }
            .into()
        }
        FoldError::Backend(BackendFault::Traceback { backend, i, j }) => BackendFault::Traceback {
            backend,
            i: restore(i),
            j: restore(j),
        }
        .into(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold::NestedFold;
    use assert2::{check, let_assert};

    fn alignment(rows: &[&str]) -> Alignment {
        Alignment::new(rows.iter().map(|r| r.as_bytes().to_vec()).collect()).unwrap()
    }

    #[test]
    fn test_unconstrained_short_hairpin() -> anyhow::Result<()> {
        let structure = PseudoknotFold::default().fold(&alignment(&["GGGAAACCC"]), None)?;
        check!(structure.len() == 9);
        check!(structure.pair_count() == 0);
        Ok(())
    }

    #[test]
    fn test_single_level_matches_nested() -> anyhow::Result<()> {
        let seed = alignment(&["GGGGCGAAAGCCCCCAUUGGCAAAAGCCAA"]);

        let nested = NestedFold.fold(&seed, None)?;
        let single = PseudoknotFold::new(1).fold(&seed, None)?;
        check!(nested == single);
        Ok(())
    }

    #[test]
    fn test_pseudoknot_constraint_is_reproduced() -> anyhow::Result<()> {
        let constraint = Structure::from_bracket("((..[[..))..]]")?;
        let structure =
            PseudoknotFold::default().fold(&alignment(&["GGAAGGAACCAACC"]), Some(&constraint))?;

        check!(structure.to_string() == "((..[[..))..]]");
        check!(!structure.is_nested());
        check!(structure.contains_pairs_of(&constraint));
        Ok(())
    }

    #[test]
    fn test_nested_fold_rejects_pseudoknot_constraint() -> anyhow::Result<()> {
        let constraint = Structure::from_bracket("((..[[..))..]]")?;
        let_assert!(
            Err(FoldError::Infeasible(InfeasibleConstraintError::Crossing { .. })) =
                NestedFold.fold(&alignment(&["GGAAGGAACCAACC"]), Some(&constraint))
        );
        Ok(())
    }

    #[test]
    fn test_levels_fit_constraint_classes() -> anyhow::Result<()> {
        let three_classes = Structure::from_bracket("(....[....{....)....]....}")?;
        check!(three_classes.class_count() == 3);

        check!(PseudoknotFold::new(0).levels(None) == 1);
        check!(PseudoknotFold::new(1).levels(None) == 1);
        check!(PseudoknotFold::new(1).levels(Some(&three_classes)) == 3);
        check!(PseudoknotFold::default().levels(Some(&three_classes)) == 3);
        check!(PseudoknotFold::new(4).levels(Some(&three_classes)) == 4);
        Ok(())
    }

    #[test]
    fn test_second_level_crosses_first_level() -> anyhow::Result<()> {
        // a GC stem whose hairpin loop holds the A side of an AU stem
        let sequence = ["G".repeat(7), "A".repeat(14), "C".repeat(7), "U".repeat(10)].concat();
        let seed = alignment(&[sequence.as_str()]);

        let nested = NestedFold.fold(&seed, None)?;
        check!(nested.pair_count() == 7);
        check!(nested.partner(0) == Some(27));

        let structure = PseudoknotFold::default().fold(&seed, None)?;
        check!(structure.contains_pairs_of(&nested));
        check!(structure.pair_count() > nested.pair_count());
        check!(!structure.is_nested());
        check!(structure.class_count() == 2);
        check!((28..38).any(|c| structure.partner(c).is_some()));
        check!(Structure::from_bracket(&structure.to_string())? == structure);
        Ok(())
    }

    #[test]
    fn test_infeasible_constraint_reports_original_columns() -> anyhow::Result<()> {
        // the level two pair is A-A
        let constraint = Structure::from_bracket("((..[...))...]")?;
        let_assert!(
            Err(FoldError::Infeasible(InfeasibleConstraintError::Unpairable { left, right })) =
                PseudoknotFold::default()
                    .fold(&alignment(&["GGAAAAAACCAAAA"]), Some(&constraint))
        );
        check!((left, right) == (4, 13));
        Ok(())
    }

    #[test]
    fn test_output_covers_every_column() -> anyhow::Result<()> {
        let seed = alignment(&[
            "GGGGCGAAAGCCCCCAUUGGCAAAAGCCAA",
            "GGGGCGAAAGCCCCCAUUGGCAAAAGCCAA",
        ]);
        let structure = PseudoknotFold::default().fold(&seed, None)?;

        check!(structure.len() == 30);
        check!(Structure::from_bracket(&structure.to_string())? == structure);
        Ok(())
    }
}
