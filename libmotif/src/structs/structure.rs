use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};
use thiserror::Error;

/// The bracket alphabet, ordered by class.
///
/// Class 0 is the plain parenthesis; every higher class is used
/// for pairs that cross at least one pair of each lower class.
pub const BRACKET_CLASSES: [(u8, u8); 30] = [
    (b'(', b')'),
    (b'[', b']'),
    (b'{', b'}'),
    (b'<', b'>'),
    (b'A', b'a'),
    (b'B', b'b'),
    (b'C', b'c'),
    (b'D', b'd'),
    (b'E', b'e'),
    (b'F', b'f'),
    (b'G', b'g'),
    (b'H', b'h'),
    (b'I', b'i'),
    (b'J', b'j'),
    (b'K', b'k'),
    (b'L', b'l'),
    (b'M', b'm'),
    (b'N', b'n'),
    (b'O', b'o'),
    (b'P', b'p'),
    (b'Q', b'q'),
    (b'R', b'r'),
    (b'S', b's'),
    (b'T', b't'),
    (b'U', b'u'),
    (b'V', b'v'),
    (b'W', b'w'),
    (b'X', b'x'),
    (b'Y', b'y'),
    (b'Z', b'z'),
];

pub const UNPAIRED_SYMBOL: u8 = b'.';

fn open_class(byte: u8) -> Option<usize> {
    BRACKET_CLASSES.iter().position(|&(open, _)| open == byte)
}

fn close_class(byte: u8) -> Option<usize> {
    BRACKET_CLASSES.iter().position(|&(_, close)| close == byte)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BracketErrorKind {
    /// A closing symbol with nothing open to close.
    UnmatchedClose(char),
    /// A closing symbol of a different class than the innermost open one.
    MismatchedClose { expected: char, found: char },
    /// An opening symbol that is never closed.
    UnclosedOpen(char),
}

impl Display for BracketErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BracketErrorKind::UnmatchedClose(c) => write!(f, "unmatched closing '{c}'"),
            BracketErrorKind::MismatchedClose { expected, found } => {
                write!(f, "expected '{expected}' but found '{found}'")
            }
            BracketErrorKind::UnclosedOpen(c) => write!(f, "unclosed opening '{c}'"),
        }
    }
}

/// An Error that is thrown when a structure annotation
/// can't be read as a set of balanced bracket pairs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed structure annotation at column {position}: {kind}")]
pub struct MalformedAnnotationError {
    pub position: usize,
    pub kind: BracketErrorKind,
}

/// An Error that is thrown when a set of pairs can't
/// describe a secondary structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPairError {
    #[error("pair ({left}, {right}) is out of bounds for a structure of length {length}")]
    OutOfBounds {
        left: usize,
        right: usize,
        length: usize,
    },
    #[error("pair ({left}, {right}) does not have left < right")]
    NotOrdered { left: usize, right: usize },
    #[error("column {position} is paired more than once")]
    MultiplyPaired { position: usize },
    #[error("structure needs more than {} bracket classes", BRACKET_CLASSES.len())]
    TooManyClasses,
}

/// One base pair between two columns (or residues).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BasePair {
    pub left: usize,
    pub right: usize,
    /// The bracket class the pair is written with.
    pub class: usize,
}

impl BasePair {
    pub fn new(left: usize, right: usize) -> Self {
        Self {
            left,
            right,
            class: 0,
        }
    }

    /// Two pairs cross if exactly one end of one lies between the ends of the other.
    pub fn crosses(&self, other: &BasePair) -> bool {
        let (a, b) = if self.left < other.left {
            (self, other)
        } else {
            (other, self)
        };
        a.left < b.left && b.left < a.right && a.right < b.right
    }

    /// Returns true if `other` lies strictly inside this pair.
    pub fn encloses(&self, other: &BasePair) -> bool {
        self.left < other.left && other.right < self.right
    }
}

/// A secondary structure over a fixed number of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    partners: Vec<Option<usize>>,
    /// Sorted by left position.
    pairs: Vec<BasePair>,
}

impl Structure {
    /// Produce a structure of the given length with no pairs.
    pub fn unpaired(length: usize) -> Self {
        Self {
            partners: vec![None; length],
            pairs: vec![],
        }
    }

    /// Build a structure from a set of pairs, assigning bracket classes.
    ///
    /// Classes are assigned greedily by increasing left position: each pair
    /// takes the lowest class in which it crosses no other pair.
    pub fn from_pairs(
        length: usize,
        pairs: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self, InvalidPairError> {
        let mut partners: Vec<Option<usize>> = vec![None; length];
        let mut ordered: Vec<BasePair> = vec![];

        for (left, right) in pairs {
            if left >= right {
                return Err(InvalidPairError::NotOrdered { left, right });
            }
            if right >= length {
                return Err(InvalidPairError::OutOfBounds {
                    left,
                    right,
                    length,
                });
            }
            for position in [left, right] {
                if partners[position].is_some() {
                    return Err(InvalidPairError::MultiplyPaired { position });
                }
            }
            partners[left] = Some(right);
            partners[right] = Some(left);
            ordered.push(BasePair::new(left, right));
        }

        ordered.sort();
        let pairs = assign_classes(ordered)?;

        Ok(Self { partners, pairs })
    }

    /// Parse a bracket string using the full class alphabet.
    ///
    /// Each class is matched on its own stack, so pairs of different
    /// classes may cross. Anything that isn't a bracket is unpaired.
    pub fn from_bracket(notation: &str) -> Result<Self, MalformedAnnotationError> {
        let bytes = notation.as_bytes();
        let mut partners: Vec<Option<usize>> = vec![None; bytes.len()];
        let mut pairs: Vec<BasePair> = vec![];
        let mut stacks: Vec<Vec<usize>> = vec![vec![]; BRACKET_CLASSES.len()];

        for (position, &byte) in bytes.iter().enumerate() {
            if let Some(class) = open_class(byte) {
                stacks[class].push(position);
            } else if let Some(class) = close_class(byte) {
                let left = stacks[class]
                    .pop()
                    .ok_or(MalformedAnnotationError {
                        position,
                        kind: BracketErrorKind::UnmatchedClose(byte as char),
                    })?;
                partners[left] = Some(position);
                partners[position] = Some(left);
                pairs.push(BasePair {
                    left,
                    right: position,
                    class,
                });
            }
        }

        if let Some((class, &position)) = stacks
            .iter()
            .enumerate()
            .filter_map(|(class, stack)| stack.first().map(|p| (class, p)))
            .min_by_key(|&(_, position)| *position)
        {
            return Err(MalformedAnnotationError {
                position,
                kind: BracketErrorKind::UnclosedOpen(BRACKET_CLASSES[class].0 as char),
            });
        }

        pairs.sort();
        Ok(Self { partners, pairs })
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    pub fn partner(&self, position: usize) -> Option<usize> {
        self.partners.get(position).copied().flatten()
    }

    /// The pairs, ordered by left position.
    pub fn pairs(&self) -> &[BasePair] {
        &self.pairs
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// The number of bracket classes in use.
    pub fn class_count(&self) -> usize {
        self.pairs.iter().map(|p| p.class + 1).max().unwrap_or(0)
    }

    /// Returns true if no two pairs cross.
    pub fn is_nested(&self) -> bool {
        let mut stack: Vec<usize> = vec![];
        for (position, partner) in self.partners.iter().enumerate() {
            match partner {
                Some(p) if *p > position => stack.push(position),
                Some(p) => {
                    if stack.pop() != Some(*p) {
                        return false;
                    }
                }
                None => {}
            }
        }
        true
    }

    /// Returns true if every pair of `other` is also a pair here.
    ///
    /// Bracket classes are ignored: only partners are compared.
    pub fn contains_pairs_of(&self, other: &Structure) -> bool {
        other
            .pairs
            .iter()
            .all(|p| self.partner(p.left) == Some(p.right))
    }
}

fn assign_classes(ordered: Vec<BasePair>) -> Result<Vec<BasePair>, InvalidPairError> {
    let mut classes: Vec<Vec<BasePair>> = vec![];
    let mut assigned = Vec::with_capacity(ordered.len());

    for mut pair in ordered {
        let class = classes
            .iter()
            .position(|members| !members.iter().any(|m| m.crosses(&pair)))
            .unwrap_or(classes.len());

        if class >= BRACKET_CLASSES.len() {
            return Err(InvalidPairError::TooManyClasses);
        }
        if class == classes.len() {
            classes.push(vec![]);
        }

        pair.class = class;
        classes[class].push(pair);
        assigned.push(pair);
    }

    Ok(assigned)
}

impl Display for Structure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut bytes = vec![UNPAIRED_SYMBOL; self.len()];
        self.pairs.iter().for_each(|p| {
            let (open, close) = BRACKET_CLASSES[p.class];
            bytes[p.left] = open;
            bytes[p.right] = close;
        });

        match std::str::from_utf8(&bytes) {
            Ok(s) => write!(f, "{s}"),
            Err(_) => Err(std::fmt::Error),
        }
    }
}

impl Serialize for Structure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn test_from_bracket_nested() -> anyhow::Result<()> {
        let structure = Structure::from_bracket("((..))..()")?;

        check!(structure.len() == 10);
        check!(structure.pair_count() == 3);
        check!(structure.partner(0) == Some(5));
        check!(structure.partner(5) == Some(0));
        check!(structure.partner(1) == Some(4));
        check!(structure.partner(8) == Some(9));
        check!(structure.partner(2) == None);
        check!(structure.is_nested());
        check!(structure.to_string() == "((..))..()");
        Ok(())
    }

    #[test]
    fn test_from_bracket_pseudoknot() -> anyhow::Result<()> {
        let structure = Structure::from_bracket("((..[[..))..]]")?;

        check!(structure.pair_count() == 4);
        check!(structure.class_count() == 2);
        check!(!structure.is_nested());
        check!(structure.partner(4) == Some(13));
        check!(structure.to_string() == "((..[[..))..]]");
        Ok(())
    }

    #[test]
    fn test_from_bracket_errors() {
        let_assert!(Err(err) = Structure::from_bracket("(.))"));
        check!(err.position == 3);
        check!(err.kind == BracketErrorKind::UnmatchedClose(')'));

        let_assert!(Err(err) = Structure::from_bracket("..((.)"));
        check!(err.position == 2);
        check!(err.kind == BracketErrorKind::UnclosedOpen('('));
    }

    #[test]
    fn test_from_pairs_assigns_classes() -> anyhow::Result<()> {
        let structure = Structure::from_pairs(14, [(0, 9), (1, 8), (4, 13), (5, 12)])?;

        check!(structure.to_string() == "((..[[..))..]]");
        check!(structure.class_count() == 2);

        let nested = Structure::from_pairs(7, [(1, 5), (0, 6)])?;
        check!(nested.to_string() == "((...))");
        Ok(())
    }

    #[test]
    fn test_from_pairs_rejects_invalid() {
        check!(
            Structure::from_pairs(5, [(0, 4), (0, 3)])
                == Err(InvalidPairError::MultiplyPaired { position: 0 })
        );
        check!(
            Structure::from_pairs(5, [(3, 1)])
                == Err(InvalidPairError::NotOrdered { left: 3, right: 1 })
        );
        check!(matches!(
            Structure::from_pairs(5, [(0, 5)]),
            Err(InvalidPairError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_contains_pairs_of() -> anyhow::Result<()> {
        let structure = Structure::from_bracket("((...))")?;
        let constraint = Structure::from_bracket("(.....)")?;
        let other = Structure::from_bracket(".(...).")?;
        let wrong = Structure::from_bracket("(....).")?;

        check!(structure.contains_pairs_of(&constraint));
        check!(structure.contains_pairs_of(&other));
        check!(!structure.contains_pairs_of(&wrong));
        Ok(())
    }

    #[test]
    fn test_crosses() {
        let a = BasePair::new(0, 5);
        let b = BasePair::new(3, 8);
        let c = BasePair::new(1, 4);

        check!(a.crosses(&b));
        check!(b.crosses(&a));
        check!(!a.crosses(&c));
        check!(a.encloses(&c));
        check!(!c.encloses(&a));
    }
}
