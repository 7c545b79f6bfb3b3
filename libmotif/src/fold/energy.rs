//! A coarse nearest-neighbour energy model, averaged over the rows of an alignment.
//!
//! Stacking and loop initiation values follow the 37°C table of
//! Freier et al. (1986). Energies are in kcal/mol; lower is more stable.

use crate::alphabet::{digital_nucleotide, PairType};
use crate::structs::Alignment;

pub const INF: f32 = f32::INFINITY;

/// The fewest unpaired columns a hairpin loop may enclose.
pub const MIN_HAIRPIN: usize = 3;
/// The most unpaired columns an interior loop or bulge may hold.
pub const MAX_INTERIOR: usize = 30;

/// A column pair is considered when at least this fraction of rows can form it.
pub const MIN_COMPATIBLE_FRACTION: f32 = 0.5;
/// Charged for every row that can't form a considered column pair.
pub const NONCOMPATIBLE_PENALTY: f32 = 1.0;
/// Credited for every extra pair type seen in one column pair.
pub const COVARIATION_BONUS: f32 = 0.5;

/// Charged for every AU or GU pair that ends a helix.
pub const TERMINAL_WEAK_PENALTY: f32 = 0.5;

pub const MULTI_CLOSING: f32 = 3.4;
pub const MULTI_UNPAIRED: f32 = 0.0;
pub const MULTI_BRANCH: f32 = 0.4;

const LOOP_EXTRAPOLATION: f32 = 1.079;

// indexed by loop size, starting at MIN_HAIRPIN
const HAIRPIN: [f32; 7] = [7.4, 5.9, 4.4, 4.3, 4.1, 4.1, 4.2];
// indexed by loop size, starting at 1
const BULGE: [f32; 6] = [3.9, 3.1, 3.5, 4.2, 4.8, 5.0];
// indexed by loop size, starting at 2
const INTERIOR: [f32; 5] = [1.0, 1.5, 1.7, 1.8, 2.0];

const ASYMMETRY: f32 = 0.5;
const MAX_ASYMMETRY: f32 = 3.0;

const GU_STACK_STRONG: f32 = -1.3;
const GU_STACK_WEAK: f32 = -0.5;

/// Stacking energies of an outer pair (row) on the pair it encloses (column).
///
/// Order: AU, CG, GC, UA.
const WATSON_CRICK_STACK: [[f32; 4]; 4] = [
    //  AU    CG    GC    UA
    [-0.9, -2.3, -1.7, -0.9], // AU
    [-1.8, -2.9, -2.0, -1.7], // CG
    [-2.1, -3.4, -2.9, -2.3], // GC
    [-0.9, -2.1, -1.8, -1.1], // UA
];

pub fn stack_energy(outer: PairType, inner: PairType) -> f32 {
    match (outer.index(), inner.index()) {
        (o, i) if o < 4 && i < 4 => WATSON_CRICK_STACK[o][i],
        _ => {
            if !outer.is_weak() || !inner.is_weak() {
                GU_STACK_STRONG
            } else {
                GU_STACK_WEAK
            }
        }
    }
}

fn extrapolate(table: &[f32], first_size: usize, size: usize) -> f32 {
    let last_size = first_size + table.len() - 1;
    if size <= last_size {
        table[size - first_size]
    } else {
        table[table.len() - 1] + LOOP_EXTRAPOLATION * (size as f32 / last_size as f32).ln()
    }
}

pub fn hairpin_initiation(size: usize) -> f32 {
    if size < MIN_HAIRPIN {
        INF
    } else {
        extrapolate(&HAIRPIN, MIN_HAIRPIN, size)
    }
}

pub fn bulge_initiation(size: usize) -> f32 {
    extrapolate(&BULGE, 1, size)
}

pub fn interior_initiation(left: usize, right: usize) -> f32 {
    let size = left + right;
    let asymmetry = (ASYMMETRY * left.abs_diff(right) as f32).min(MAX_ASYMMETRY);
    extrapolate(&INTERIOR, 2, size) + asymmetry
}

/// The per-column-pair tables the folding recursions read from.
///
/// Every energy is an average over the alignment rows, so one
/// consensus structure is scored against all of them at once.
pub struct AlignmentEnergy {
    width: usize,
    /// Digital residues; `None` for gaps and degenerate symbols
    rows: Vec<Vec<Option<u8>>>,
    /// Pairing cost of each column pair; `INF` where the pair is not considered
    pair: Vec<f32>,
    /// Average helix-end penalty of each column pair
    terminal: Vec<f32>,
}

impl AlignmentEnergy {
    /// Precompute the column pair tables.
    ///
    /// `forced` pairs are always considered as long as one row can form them,
    /// regardless of how many rows agree.
    pub fn new(alignment: &Alignment, forced: &[(usize, usize)]) -> Self {
        let width = alignment.width;
        let rows: Vec<Vec<Option<u8>>> = alignment
            .rows
            .iter()
            .map(|row| row.iter().map(|&b| digital_nucleotide(b)).collect())
            .collect();

        let mut energy = Self {
            width,
            rows,
            pair: vec![INF; width * width],
            terminal: vec![0.0; width * width],
        };

        let num_rows = energy.rows.len().max(1) as f32;
        let mut is_forced = vec![None; width];
        forced.iter().for_each(|&(left, right)| {
            is_forced[left] = Some(right);
        });

        for i in 0..width {
            for j in (i + MIN_HAIRPIN + 1)..width {
                let mut compatible = 0usize;
                let mut weak = 0usize;
                let mut seen = [false; PairType::COUNT];

                for row in energy.rows.iter() {
                    if let Some(pair_type) = energy_pair(row, i, j) {
                        compatible += 1;
                        seen[pair_type.index()] = true;
                        if pair_type.is_weak() {
                            weak += 1;
                        }
                    }
                }

                let fraction = compatible as f32 / num_rows;
                let considered = match is_forced[i] {
                    Some(right) if right == j => compatible > 0,
                    _ => fraction >= MIN_COMPATIBLE_FRACTION,
                };

                if considered {
                    let distinct = seen.iter().filter(|&&s| s).count();
                    let idx = i * width + j;
                    energy.pair[idx] = NONCOMPATIBLE_PENALTY * (1.0 - fraction)
                        - COVARIATION_BONUS * distinct.saturating_sub(1) as f32;
                    energy.terminal[idx] = TERMINAL_WEAK_PENALTY * weak as f32 / num_rows;
                }
            }
        }

        energy
    }

    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    pub fn can_pair(&self, i: usize, j: usize) -> bool {
        self.pair[i * self.width + j] < INF
    }

    /// The number of rows able to form the pair of columns `i` and `j`.
    pub fn compatible_rows(&self, i: usize, j: usize) -> usize {
        self.rows
            .iter()
            .filter(|row| energy_pair(row, i, j).is_some())
            .count()
    }

    #[inline(always)]
    pub fn pair(&self, i: usize, j: usize) -> f32 {
        self.pair[i * self.width + j]
    }

    #[inline(always)]
    pub fn terminal(&self, i: usize, j: usize) -> f32 {
        self.terminal[i * self.width + j]
    }

    fn average_stack(&self, i: usize, j: usize, k: usize, l: usize) -> f32 {
        let num_rows = self.rows.len().max(1) as f32;
        let sum: f32 = self
            .rows
            .iter()
            .filter_map(|row| Some(stack_energy(energy_pair(row, i, j)?, energy_pair(row, k, l)?)))
            .sum();
        sum / num_rows
    }

    /// The energy of the hairpin loop closed by `i` and `j`.
    pub fn hairpin(&self, i: usize, j: usize) -> f32 {
        hairpin_initiation(j - i - 1) + self.terminal(i, j)
    }

    /// The energy of the loop between the outer pair `i`, `j`
    /// and the inner pair `k`, `l`: a stack, bulge or interior loop.
    pub fn interior(&self, i: usize, j: usize, k: usize, l: usize) -> f32 {
        let left = k - i - 1;
        let right = j - l - 1;

        match (left, right) {
            (0, 0) => self.average_stack(i, j, k, l),
            (0, 1) | (1, 0) => bulge_initiation(1) + self.average_stack(i, j, k, l),
            (0, n) | (n, 0) => bulge_initiation(n) + self.terminal(i, j) + self.terminal(k, l),
            (n, m) => interior_initiation(n, m) + self.terminal(i, j) + self.terminal(k, l),
        }
    }
}

#[inline(always)]
fn energy_pair(row: &[Option<u8>], i: usize, j: usize) -> Option<PairType> {
    PairType::from_digital(row[i]?, row[j]?)
}
