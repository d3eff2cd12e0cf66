//! Merging of adjacent same-class annotations
//!
//! Emissions recorded across consecutive FFT lines often come out of the
//! labeling tools as several stacked boxes. Two boxes of the same class are
//! merged when their horizontal extents agree (or overlap) and the vertical
//! gap between them is below the class time threshold. Overlapping boxes of
//! the same class are merged even when they stem from separate transmissions.

use crate::annotation::Annotation;
use crate::tables::MergeThresholds;
use std::collections::BTreeSet;

/// True when the two spans `[lo_a, hi_a]` and `[lo_b, hi_b]` overlap.
///
/// Crossing and nested spans both give factors of opposite sign.
pub fn spans_overlap(lo_a: f64, hi_a: f64, lo_b: f64, hi_b: f64) -> bool {
    (lo_a - hi_b) * (hi_a - lo_b) < 0.0
}

/// Whether `j` (sorted after `i`) may be merged into `i`
fn mergeable(i: &Annotation, j: &Annotation, side: f64, time: f64) -> bool {
    if i.label != j.label {
        return false;
    }

    let avg_width = (i.width + j.width) / 2.0;
    let similar_sides = (i.left() - j.left()).abs() < side * avg_width
        && (i.right() - j.right()).abs() < side * avg_width;
    let overlapping = spans_overlap(i.left(), i.right(), j.left(), j.right());

    (similar_sides || overlapping) && j.up() - i.down() < time
}

/// First mergeable `(i, j)` pair in scan order
fn find_pair(
    annotations: &[Annotation],
    thresholds: &MergeThresholds,
    unknown: &mut BTreeSet<i32>,
) -> Option<(usize, usize)> {
    for (i, pivot) in annotations.iter().enumerate() {
        let Some((side, time)) = thresholds.get(pivot.label) else {
            unknown.insert(pivot.label);
            continue;
        };

        for (offset, other) in annotations[i + 1..].iter().enumerate() {
            if mergeable(pivot, other, side, time) {
                return Some((i, i + 1 + offset));
            }
        }
    }
    None
}

/// Merge a picture's annotations until no pair is mergeable.
///
/// Empty annotations are dropped. Boxes are scanned sorted by class, upper
/// edge, left edge, right edge and lower edge, so the result does not
/// depend on the input order even when boxes share an edge.
pub fn merge_annotations(
    annotations: Vec<Annotation>,
    thresholds: &MergeThresholds,
) -> Vec<Annotation> {
    let mut current: Vec<Annotation> = annotations.into_iter().filter(|a| !a.is_empty()).collect();
    current.sort_by(|a, b| {
        a.label
            .cmp(&b.label)
            .then_with(|| a.up().total_cmp(&b.up()))
            .then_with(|| a.left().total_cmp(&b.left()))
            .then_with(|| a.right().total_cmp(&b.right()))
            .then_with(|| a.down().total_cmp(&b.down()))
    });

    let mut unknown = BTreeSet::new();
    while let Some((i, j)) = find_pair(&current, thresholds, &mut unknown) {
        let merged = current[i].union(&current[j]);
        current = current
            .iter()
            .enumerate()
            .filter(|&(k, _)| k != j)
            .map(|(k, a)| if k == i { merged } else { *a })
            .collect();
    }

    if !unknown.is_empty() {
        tracing::warn!("No merge thresholds for classes {:?}, left unmerged", unknown);
    }

    current
}
