use log::trace;

use super::energy::{
    AlignmentEnergy, INF, MAX_INTERIOR, MIN_HAIRPIN, MULTI_BRANCH, MULTI_CLOSING, MULTI_UNPAIRED,
};
use super::{first_crossing, BackendFault, FoldError, FoldingStrategy, InfeasibleConstraintError};
use crate::structs::{Alignment, Structure};
use crate::util::MinAssign;

const NESTED_BACKEND: &str = "nested fold";

/// Minimum free energy folding of a whole alignment into one pseudoknot-free structure.
#[derive(Clone, Default)]
pub struct NestedFold;

impl FoldingStrategy for NestedFold {
    fn name(&self) -> &'static str {
        NESTED_BACKEND
    }

    fn predict(
        &self,
        alignment: &Alignment,
        constraint: Option<&Structure>,
    ) -> Result<Structure, FoldError> {
        let forced: Vec<(usize, usize)> = match constraint {
            Some(constraint) => {
                if let Some((first, second)) = first_crossing(constraint) {
                    return Err(InfeasibleConstraintError::Crossing { first, second }.into());
                }
                constraint.pairs().iter().map(|p| (p.left, p.right)).collect()
            }
            None => vec![],
        };

        let reserved = vec![false; alignment.width];
        let pairs = fold_nested(alignment, &forced, &reserved)?;

        Structure::from_pairs(alignment.width, pairs).map_err(|source| {
            BackendFault::InvalidStructure {
                backend: NESTED_BACKEND,
                source,
            }
            .into()
        })
    }
}

/// Fold the alignment, returning the pairs of the minimum free energy structure.
///
/// Every `forced` pair is part of the result. `reserved` columns stay unpaired.
pub(crate) fn fold_nested(
    alignment: &Alignment,
    forced: &[(usize, usize)],
    reserved: &[bool],
) -> Result<Vec<(usize, usize)>, FoldError> {
    let energy = AlignmentEnergy::new(alignment, forced);

    for &(left, right) in forced {
        if right - left - 1 < MIN_HAIRPIN {
            return Err(InfeasibleConstraintError::LoopTooShort { left, right }.into());
        }
        if energy.compatible_rows(left, right) == 0 {
            return Err(InfeasibleConstraintError::Unpairable { left, right }.into());
        }
    }

    let mut matrices = NestedMatrices::new(&energy, forced, reserved);
    matrices.fill();

    let total = matrices.exterior[energy.width()];
    if total == INF {
        return Err(InfeasibleConstraintError::NoStructure.into());
    }
    trace!("nested fold of width {} has energy {total:.2}", energy.width());

    matrices.traceback()
}

/// The dynamic programming state of one fold.
struct NestedMatrices<'a> {
    energy: &'a AlignmentEnergy,
    width: usize,
    /// The constraint partner of each column
    partner: Vec<Option<usize>>,
    /// The number of constrained columns before each index
    constrained_prefix: Vec<usize>,
    reserved: &'a [bool],
    /// Best energy of the span closed by a pair of its ends
    closed: Vec<f32>,
    /// Best energy of the span as part of a multiloop with at least one branch
    multi: Vec<f32>,
    /// Best energy of each prefix, indexed by prefix length
    exterior: Vec<f32>,
}

enum TracebackTask {
    Exterior(usize),
    Pair(usize, usize),
    Multi(usize, usize),
}

impl<'a> NestedMatrices<'a> {
    fn new(energy: &'a AlignmentEnergy, forced: &[(usize, usize)], reserved: &'a [bool]) -> Self {
        let width = energy.width();
        let mut partner = vec![None; width];
        forced.iter().for_each(|&(left, right)| {
            partner[left] = Some(right);
            partner[right] = Some(left);
        });

        let mut constrained_prefix = vec![0usize; width + 1];
        for idx in 0..width {
            constrained_prefix[idx + 1] = constrained_prefix[idx] + partner[idx].is_some() as usize;
        }

        Self {
            energy,
            width,
            partner,
            constrained_prefix,
            reserved,
            closed: vec![INF; width * width],
            multi: vec![INF; width * width],
            exterior: vec![INF; width + 1],
        }
    }

    #[inline(always)]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * self.width + j
    }

    /// Returns true if column `idx` may be left unpaired.
    #[inline(always)]
    fn may_skip(&self, idx: usize) -> bool {
        self.partner[idx].is_none()
    }

    /// Returns true if every column in `start..end` may be left unpaired.
    #[inline(always)]
    fn free(&self, start: usize, end: usize) -> bool {
        start >= end || self.constrained_prefix[end] == self.constrained_prefix[start]
    }

    fn allowed(&self, i: usize, j: usize) -> bool {
        self.energy.can_pair(i, j)
            && !self.reserved[i]
            && !self.reserved[j]
            && self.partner[i].map_or(true, |p| p == j)
            && self.partner[j].map_or(true, |p| p == i)
    }

    fn multi_closing(&self, i: usize, j: usize, k: usize) -> f32 {
        MULTI_CLOSING
            + MULTI_BRANCH
            + self.energy.terminal(i, j)
            + self.multi[self.idx(i + 1, k - 1)]
            + self.multi[self.idx(k, j - 1)]
    }

    fn branch(&self, i: usize, j: usize) -> f32 {
        self.closed[self.idx(i, j)] + MULTI_BRANCH + self.energy.terminal(i, j)
    }

    fn exterior_branch(&self, k: usize, j: usize) -> f32 {
        self.exterior[k] + self.closed[self.idx(k, j)] + self.energy.terminal(k, j)
    }

    /// Call `f` with every inner pair `k`, `l` that may close an
    /// interior loop, bulge or stack under the pair `i`, `j`.
    fn for_each_inner_pair(&self, i: usize, j: usize, mut f: impl FnMut(usize, usize)) {
        for k in (i + 1)..j {
            let left = k - i - 1;
            if left > MAX_INTERIOR || !self.free(i + 1, k) {
                break;
            }
            for l in ((k + MIN_HAIRPIN + 1)..j).rev() {
                let right = j - l - 1;
                if left + right > MAX_INTERIOR || !self.free(l + 1, j) {
                    break;
                }
                if self.closed[self.idx(k, l)] < INF {
                    f(k, l);
                }
            }
        }
    }

    fn fill_closed(&mut self, i: usize, j: usize) {
        if !self.allowed(i, j) {
            return;
        }

        let mut best = INF;

        if self.free(i + 1, j) {
            best.min_assign(self.energy.hairpin(i, j));
        }

        self.for_each_inner_pair(i, j, |k, l| {
            best.min_assign(self.energy.interior(i, j, k, l) + self.closed[self.idx(k, l)]);
        });

        for k in (i + 2)..j {
            best.min_assign(self.multi_closing(i, j, k));
        }

        let idx = self.idx(i, j);
        self.closed[idx] = self.energy.pair(i, j) + best;
    }

    fn fill_multi(&mut self, i: usize, j: usize) {
        let mut best = self.branch(i, j);

        if self.may_skip(i) {
            best.min_assign(self.multi[self.idx(i + 1, j)] + MULTI_UNPAIRED);
        }
        if self.may_skip(j) {
            best.min_assign(self.multi[self.idx(i, j - 1)] + MULTI_UNPAIRED);
        }
        for k in (i + 1)..=j {
            best.min_assign(self.multi[self.idx(i, k - 1)] + self.multi[self.idx(k, j)]);
        }

        let idx = self.idx(i, j);
        self.multi[idx] = best;
    }

    fn fill(&mut self) {
        // the single column spans can't hold a pair, so they stay INF
        for span in 1..self.width {
            for i in 0..(self.width - span) {
                let j = i + span;
                if span > MIN_HAIRPIN {
                    self.fill_closed(i, j);
                }
                self.fill_multi(i, j);
            }
        }

        self.exterior[0] = 0.0;
        for j in 0..self.width {
            let mut best = INF;
            if self.may_skip(j) {
                best = self.exterior[j];
            }
            for k in 0..j {
                best.min_assign(self.exterior_branch(k, j));
            }
            self.exterior[j + 1] = best;
        }
    }

    fn traceback_fault(i: usize, j: usize) -> FoldError {
        BackendFault::Traceback {
            backend: NESTED_BACKEND,
            i,
            j,
        }
        .into()
    }

    fn traceback(&self) -> Result<Vec<(usize, usize)>, FoldError> {
        let mut pairs = vec![];
        let mut tasks = vec![TracebackTask::Exterior(self.width)];

        while let Some(task) = tasks.pop() {
            match task {
                TracebackTask::Exterior(0) => {}
                TracebackTask::Exterior(length) => {
                    let j = length - 1;
                    let target = self.exterior[length];

                    if self.may_skip(j) && self.exterior[j] == target {
                        tasks.push(TracebackTask::Exterior(j));
                        continue;
                    }

                    let k = (0..j)
                        .find(|&k| self.exterior_branch(k, j) == target)
                        .ok_or_else(|| Self::traceback_fault(0, j))?;
                    tasks.push(TracebackTask::Pair(k, j));
                    tasks.push(TracebackTask::Exterior(k));
                }
                TracebackTask::Pair(i, j) => {
                    pairs.push((i, j));
                    let target = self.closed[self.idx(i, j)];
                    let pair = self.energy.pair(i, j);

                    if self.free(i + 1, j) && pair + self.energy.hairpin(i, j) == target {
                        continue;
                    }

                    let mut inner = None;
                    self.for_each_inner_pair(i, j, |k, l| {
                        if inner.is_none()
                            && pair
                                + (self.energy.interior(i, j, k, l) + self.closed[self.idx(k, l)])
                                == target
                        {
                            inner = Some((k, l));
                        }
                    });
                    if let Some((k, l)) = inner {
                        tasks.push(TracebackTask::Pair(k, l));
                        continue;
                    }

                    let k = ((i + 2)..j)
                        .find(|&k| pair + self.multi_closing(i, j, k) == target)
                        .ok_or_else(|| Self::traceback_fault(i, j))?;
                    tasks.push(TracebackTask::Multi(i + 1, k - 1));
                    tasks.push(TracebackTask::Multi(k, j - 1));
                }
                TracebackTask::Multi(i, j) => {
                    let target = self.multi[self.idx(i, j)];

                    if self.closed[self.idx(i, j)] < INF && self.branch(i, j) == target {
                        tasks.push(TracebackTask::Pair(i, j));
                    } else if self.may_skip(i)
                        && i < j
                        && self.multi[self.idx(i + 1, j)] + MULTI_UNPAIRED == target
                    {
                        tasks.push(TracebackTask::Multi(i + 1, j));
                    } else if self.may_skip(j)
                        && i < j
                        && self.multi[self.idx(i, j - 1)] + MULTI_UNPAIRED == target
                    {
                        tasks.push(TracebackTask::Multi(i, j - 1));
                    } else {
                        let k = ((i + 1)..=j)
                            .find(|&k| {
                                self.multi[self.idx(i, k - 1)] + self.multi[self.idx(k, j)]
                                    == target
                            })
                            .ok_or_else(|| Self::traceback_fault(i, j))?;
                        tasks.push(TracebackTask::Multi(i, k - 1));
                        tasks.push(TracebackTask::Multi(k, j));
                    }
                }
            }
        }

        pairs.sort();
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    fn alignment(rows: &[&str]) -> Alignment {
        Alignment::new(rows.iter().map(|r| r.as_bytes().to_vec()).collect()).unwrap()
    }

    #[test]
    fn test_short_hairpin_stays_unpaired() -> anyhow::Result<()> {
        let structure = NestedFold.fold(&alignment(&["GGGAAACCC"]), None)?;

        check!(structure.len() == 9);
        check!(structure.pair_count() == 0);
        check!(structure.to_string() == ".........");
        Ok(())
    }

    #[test]
    fn test_stable_hairpin_folds() -> anyhow::Result<()> {
        let structure = NestedFold.fold(&alignment(&["GGGGCGAAAGCCCCC"]), None)?;

        check!(structure.len() == 15);
        check!(structure.is_nested());
        check!(structure.pair_count() >= 4);
        // the outermost stem pairs the 5' G run with the 3' C run
        check!(structure.partner(1).is_some());
        Ok(())
    }

    #[test]
    fn test_constraint_is_forced() -> anyhow::Result<()> {
        let constraint = Structure::from_bracket("((...))")?;
        let structure = NestedFold.fold(&alignment(&["GGAAACC"]), Some(&constraint))?;

        check!(structure.to_string() == "((...))");
        check!(structure.partner(0) == Some(6));
        check!(structure.partner(1) == Some(5));
        Ok(())
    }

    #[test]
    fn test_constraint_overrides_unfavourable_energy() -> anyhow::Result<()> {
        // on its own this folds to nothing, see above
        let constraint = Structure::from_bracket("(((...)))")?;
        let structure = NestedFold.fold(&alignment(&["GGGAAACCC"]), Some(&constraint))?;

        check!(structure.to_string() == "(((...)))");
        Ok(())
    }

    #[test]
    fn test_constrained_columns_cannot_pair_elsewhere() -> anyhow::Result<()> {
        let constraint = Structure::from_bracket("(....)..........")?;
        let structure = NestedFold.fold(&alignment(&["GAAAACGGGAAAACCC"]), Some(&constraint))?;

        check!(structure.partner(0) == Some(5));
        check!(structure.contains_pairs_of(&constraint));
        Ok(())
    }

    #[test]
    fn test_infeasible_constraints() -> anyhow::Result<()> {
        let short = Structure::from_bracket("((.))")?;
        let_assert!(
            Err(FoldError::Infeasible(InfeasibleConstraintError::LoopTooShort { left, right })) =
                NestedFold.fold(&alignment(&["GGACC"]), Some(&short))
        );
        check!((left, right) == (1, 3));

        let unpairable = Structure::from_bracket("(...)")?;
        let_assert!(
            Err(FoldError::Infeasible(InfeasibleConstraintError::Unpairable { .. })) =
                NestedFold.fold(&alignment(&["AAAAA", "CAAAC"]), Some(&unpairable))
        );

        let crossing = Structure::from_bracket("(..[...)...]")?;
        let_assert!(
            Err(FoldError::Infeasible(InfeasibleConstraintError::Crossing { .. })) =
                NestedFold.fold(&alignment(&["GGGGGGCCCCCC"]), Some(&crossing))
        );
        Ok(())
    }

    #[test]
    fn test_gapped_rows_fold_column_wise() -> anyhow::Result<()> {
        let structure = NestedFold.fold(
            &alignment(&[
                "GGGGC-GAAAGCCCCC",
                "GGGGCAGAAAGCCCCC",
                "GGGGC-GAAAGCCCCC",
            ]),
            None,
        )?;

        check!(structure.len() == 16);
        check!(structure.pair_count() >= 4);
        Ok(())
    }

    #[test]
    fn test_empty_alignment() -> anyhow::Result<()> {
        let structure = NestedFold.fold(&Alignment::default(), None)?;
        check!(structure.is_empty());
        Ok(())
    }
}
