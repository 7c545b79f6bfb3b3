pub mod energy;

mod nested;
pub use nested::*;

mod pseudoknot;
pub use pseudoknot::*;

use thiserror::Error;

use crate::structs::structure::{BasePair, InvalidPairError};
use crate::structs::{Alignment, Structure};

/// An Error that is thrown when no structure can reproduce every pair of a constraint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InfeasibleConstraintError {
    #[error("constraint has length {constraint}, but the alignment has width {width}")]
    LengthMismatch { constraint: usize, width: usize },
    #[error("constraint pair ({left}, {right}) encloses fewer than {min} columns", min = energy::MIN_HAIRPIN)]
    LoopTooShort { left: usize, right: usize },
    #[error("no sequence can form constraint pair ({left}, {right})")]
    Unpairable { left: usize, right: usize },
    #[error("constraint pairs ({}, {}) and ({}, {}) cross", .first.left, .first.right, .second.left, .second.right)]
    Crossing { first: BasePair, second: BasePair },
    #[error("no structure over the alignment satisfies the constraint")]
    NoStructure,
    #[error("{backend} did not reproduce constraint pair ({left}, {right})")]
    NotReproduced {
        backend: &'static str,
        left: usize,
        right: usize,
    },
}

/// An Error that is thrown when a folding backend fails on its own account.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendFault {
    #[error("{backend} produced a structure of length {found}, expected {expected}")]
    InvalidLength {
        backend: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{backend} produced an invalid structure: {source}")]
    InvalidStructure {
        backend: &'static str,
        source: InvalidPairError,
    },
    #[error("{backend} failed to trace back cell ({i}, {j})")]
    Traceback {
        backend: &'static str,
        i: usize,
        j: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FoldError {
    #[error(transparent)]
    Infeasible(#[from] InfeasibleConstraintError),
    #[error(transparent)]
    Backend(#[from] BackendFault),
}

dyn_clone::clone_trait_object!(FoldingStrategy);

/// A consensus structure predictor.
///
/// One strategy is chosen per run and shared by every record, so
/// implementations must not keep per-call state in `self`.
pub trait FoldingStrategy: dyn_clone::DynClone + Send + Sync {
    fn name(&self) -> &'static str;

    /// Predict a consensus structure for the alignment.
    ///
    /// Implementors produce the raw prediction; callers should go through
    /// [`FoldingStrategy::fold`], which also checks it.
    fn predict(
        &self,
        alignment: &Alignment,
        constraint: Option<&Structure>,
    ) -> Result<Structure, FoldError>;

    /// Predict a consensus structure and check it against the alignment width and the constraint.
    fn fold(
        &self,
        alignment: &Alignment,
        constraint: Option<&Structure>,
    ) -> Result<Structure, FoldError> {
        if let Some(constraint) = constraint {
            if constraint.len() != alignment.width {
                return Err(InfeasibleConstraintError::LengthMismatch {
                    constraint: constraint.len(),
                    width: alignment.width,
                }
                .into());
            }
        }

        let structure = self.predict(alignment, constraint)?;

        if structure.len() != alignment.width {
            return Err(BackendFault::InvalidLength {
                backend: self.name(),
                expected: alignment.width,
                found: structure.len(),
            }
            .into());
        }

        if let Some(constraint) = constraint {
            if let Some(missing) = constraint
                .pairs()
                .iter()
                .find(|p| structure.partner(p.left) != Some(p.right))
            {
                return Err(InfeasibleConstraintError::NotReproduced {
                    backend: self.name(),
                    left: missing.left,
                    right: missing.right,
                }
                .into());
            }
        }

        Ok(structure)
    }
}

/// Find two pairs of a structure that cross, if there are any.
pub fn first_crossing(structure: &Structure) -> Option<(BasePair, BasePair)> {
    let pairs = structure.pairs();
    pairs.iter().enumerate().find_map(|(idx, a)| {
        pairs[(idx + 1)..]
            .iter()
            .find(|b| a.crosses(b))
            .map(|b| (*a, *b))
    })
}
