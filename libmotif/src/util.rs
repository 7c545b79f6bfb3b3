#[cfg(test)]
#[ctor::ctor]
fn init_backtrace() {
    color_backtrace::install();
}

pub trait MinAssign {
    fn min_assign(&mut self, value: Self);
}

impl MinAssign for f32 {
    #[inline(always)]
    fn min_assign(&mut self, value: Self) {
        *self = self.min(value);
    }
}

/// Produce the ungapped index of every column of an aligned
/// sequence, or None where the column holds a gap.
pub fn ungapped_indices(aligned: &[u8]) -> Vec<Option<usize>> {
    let mut next = 0usize;
    aligned
        .iter()
        .map(|&b| {
            if crate::alphabet::is_gap(b) {
                None
            } else {
                next += 1;
                Some(next - 1)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn test_min_assign() {
        let mut best = f32::INFINITY;
        best.min_assign(3.0);
        best.min_assign(4.0);
        check!(best == 3.0);
    }

    #[test]
    fn test_ungapped_indices() {
        check!(ungapped_indices(b"A-C..G") == vec![Some(0), None, Some(1), None, None, Some(2)]);
        check!(ungapped_indices(b"").is_empty());
    }
}
