//! Conversion of WUSS consensus annotation into folding constraints.
//!
//! WUSS (Washington University Secondary Structure) notation writes the
//! nested pairs of an Rfam `SS_cons` line with four bracket glyphs whose
//! choice encodes the loop context (`<>` for stems closing hairpins, `()`
//! for branches of multiloops, and so on), pseudoknotted pairs with
//! upper/lower case letter pairs, and unpaired columns with a handful of
//! loop-type glyphs. A folding backend only needs the pairs.

use crate::structs::structure::{BracketErrorKind, MalformedAnnotationError, UNPAIRED_SYMBOL};
use crate::structs::Structure;

const WUSS_NESTED_OPEN: [u8; 4] = [b'<', b'(', b'[', b'{'];
const WUSS_NESTED_CLOSE: [u8; 4] = [b'>', b')', b']', b'}'];

fn nested_open(byte: u8) -> Option<usize> {
    WUSS_NESTED_OPEN.iter().position(|&b| b == byte)
}

fn nested_close(byte: u8) -> Option<usize> {
    WUSS_NESTED_CLOSE.iter().position(|&b| b == byte)
}

/// Convert a WUSS annotation into a plain bracket constraint string.
///
/// Every nested pair becomes `(`/`)` and keeps its partner. Pseudoknot
/// letters are checked for balance but written as unpaired, as is every
/// other glyph. The four nested bracket kinds share one stack, so a closing
/// glyph must match the kind of the innermost open one.
pub fn wuss_to_constraint(annotation: &str) -> Result<String, MalformedAnnotationError> {
    let bytes = annotation.as_bytes();
    let mut constraint = vec![UNPAIRED_SYMBOL; bytes.len()];

    let mut nested_stack: Vec<(usize, usize)> = vec![];
    // one stack per pseudoknot letter, A..Z
    let mut knot_stacks: Vec<Vec<usize>> = vec![vec![]; 26];

    for (position, &byte) in bytes.iter().enumerate() {
        if let Some(kind) = nested_open(byte) {
            nested_stack.push((position, kind));
        } else if let Some(kind) = nested_close(byte) {
            match nested_stack.pop() {
                Some((left, open_kind)) if open_kind == kind => {
                    constraint[left] = b'(';
                    constraint[position] = b')';
                }
                Some((_, open_kind)) => {
                    return Err(MalformedAnnotationError {
                        position,
                        kind: BracketErrorKind::MismatchedClose {
                            expected: WUSS_NESTED_CLOSE[open_kind] as char,
                            found: byte as char,
                        },
                    })
                }
                None => {
                    return Err(MalformedAnnotationError {
                        position,
                        kind: BracketErrorKind::UnmatchedClose(byte as char),
                    })
                }
            }
        } else if byte.is_ascii_uppercase() {
            knot_stacks[(byte - b'A') as usize].push(position);
        } else if byte.is_ascii_lowercase() {
            if knot_stacks[(byte - b'a') as usize].pop().is_none() {
                return Err(MalformedAnnotationError {
                    position,
                    kind: BracketErrorKind::UnmatchedClose(byte as char),
                });
            }
        }
    }

    let unclosed_nested = nested_stack
        .first()
        .map(|&(position, kind)| (position, WUSS_NESTED_OPEN[kind] as char));
    let unclosed_knot = knot_stacks
        .iter()
        .enumerate()
        .filter_map(|(letter, stack)| stack.first().map(|&p| (p, (b'A' + letter as u8) as char)))
        .min();

    if let Some((position, open)) = [unclosed_nested, unclosed_knot].into_iter().flatten().min() {
        return Err(MalformedAnnotationError {
            position,
            kind: BracketErrorKind::UnclosedOpen(open),
        });
    }

    // the constraint bytes are all ASCII
    Ok(String::from_utf8_lossy(&constraint).into_owned())
}

/// Convert a WUSS annotation straight into a constraint structure.
pub fn parse_constraint(annotation: &str) -> Result<Structure, MalformedAnnotationError> {
    let plain = wuss_to_constraint(annotation)?;
    Structure::from_bracket(&plain)
}
