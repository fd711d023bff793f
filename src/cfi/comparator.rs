//! CFI ordering
//!
//! Document order over parsed CFIs: steps are compared pairwise, a path that
//! is a prefix of another comes first, then character offsets decide. ID
//! assertions never affect order. Ranges order by their start point, then by
//! their end point.

use std::cmp::Ordering;

use super::parser::{parse, CfiParseError};
use super::types::*;

fn compare_steps(a: &CfiStep, b: &CfiStep) -> Ordering {
    match (a.kind, b.kind) {
        (StepKind::Indirection, StepKind::Indirection) => Ordering::Equal,
        (StepKind::Element(x), StepKind::Element(y)) => x.cmp(&y),
        (StepKind::Indirection, StepKind::Element(_)) => Ordering::Less,
        (StepKind::Element(_), StepKind::Indirection) => Ordering::Greater,
    }
}

/// Compare two absolute paths in reading order
pub fn compare_paths(a: &CfiPath, b: &CfiPath) -> Ordering {
    for (step_a, step_b) in a.steps.iter().zip(b.steps.iter()) {
        let cmp = compare_steps(step_a, step_b);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    a.steps
        .len()
        .cmp(&b.steps.len())
        .then_with(|| match (a.offset, b.offset) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        })
}

impl Cfi {
    /// Reading-order comparison
    pub fn position_cmp(&self, other: &Cfi) -> Ordering {
        compare_paths(&self.start_point(), &other.start_point())
            .then_with(|| compare_paths(&self.end_point(), &other.end_point()))
    }
}

/// Parse and compare two CFI strings
pub fn compare_cfi_strings(a: &str, b: &str) -> Result<Ordering, CfiParseError> {
    Ok(parse(a)?.position_cmp(&parse(b)?))
}
