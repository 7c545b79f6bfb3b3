use phf::phf_map;

pub const UTF8_DASH: u8 = 45;
pub const UTF8_DOT: u8 = 46;
pub const UTF8_UNDERSCORE: u8 = 95;
pub const UTF8_TILDE: u8 = 126;

/// Maps the unambiguous nucleotide bytes to [0u8..3u8].
///
/// Degenerate IUPAC symbols are absent: a failed lookup
/// marks a residue that can't take part in a base pair.
pub const UTF8_TO_DIGITAL_NUCLEOTIDE: phf::Map<u8, u8> = phf_map! {
    // upper case
    65u8 => 0,    // A
    67u8 => 1,    // C
    71u8 => 2,    // G
    85u8 => 3,    // U
    84u8 => 3,    // T
    // lower case
    97u8 => 0,    // a
    99u8 => 1,    // c
    103u8 => 2,   // g
    117u8 => 3,   // u
    116u8 => 3,   // t
};

pub const NUCLEOTIDE_A: u8 = 0;
pub const NUCLEOTIDE_C: u8 = 1;
pub const NUCLEOTIDE_G: u8 = 2;
pub const NUCLEOTIDE_U: u8 = 3;

/// Returns true for the symbols Stockholm alignments use to mark gaps.
#[inline(always)]
pub fn is_gap(byte: u8) -> bool {
    matches!(byte, UTF8_DASH | UTF8_DOT | UTF8_UNDERSCORE | UTF8_TILDE)
}

#[inline(always)]
pub fn digital_nucleotide(byte: u8) -> Option<u8> {
    UTF8_TO_DIGITAL_NUCLEOTIDE.get(&byte).copied()
}

/// The six base pairs the energy model knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PairType {
    AU,
    CG,
    GC,
    UA,
    GU,
    UG,
}

impl PairType {
    pub const COUNT: usize = 6;

    pub fn from_digital(left: u8, right: u8) -> Option<Self> {
        match (left, right) {
            (NUCLEOTIDE_A, NUCLEOTIDE_U) => Some(PairType::AU),
            (NUCLEOTIDE_C, NUCLEOTIDE_G) => Some(PairType::CG),
            (NUCLEOTIDE_G, NUCLEOTIDE_C) => Some(PairType::GC),
            (NUCLEOTIDE_U, NUCLEOTIDE_A) => Some(PairType::UA),
            (NUCLEOTIDE_G, NUCLEOTIDE_U) => Some(PairType::GU),
            (NUCLEOTIDE_U, NUCLEOTIDE_G) => Some(PairType::UG),
            _ => None,
        }
    }

    /// Produce the pair type formed by two UTF8 residue bytes, if any.
    ///
    /// Gaps and degenerate symbols never pair.
    pub fn from_utf8(left: u8, right: u8) -> Option<Self> {
        Self::from_digital(digital_nucleotide(left)?, digital_nucleotide(right)?)
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// AU, UA, GU and UG pairs carry a helix-end penalty.
    pub fn is_weak(&self) -> bool {
        !matches!(self, PairType::CG | PairType::GC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_types() {
        assert_eq!(PairType::from_utf8(b'G', b'C'), Some(PairType::GC));
        assert_eq!(PairType::from_utf8(b'g', b'u'), Some(PairType::GU));
        assert_eq!(PairType::from_utf8(b'A', b'T'), Some(PairType::AU));
        assert_eq!(PairType::from_utf8(b'A', b'G'), None);
        assert_eq!(PairType::from_utf8(b'N', b'C'), None);
        assert_eq!(PairType::from_utf8(b'-', b'C'), None);
    }

    #[test]
    fn test_gaps() {
        assert!(is_gap(b'-'));
        assert!(is_gap(b'.'));
        assert!(!is_gap(b'N'));
        assert!(!is_gap(b'A'));
    }
}
