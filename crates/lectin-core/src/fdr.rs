//! Target-decoy false discovery rate estimation.
//!
//! Targets and decoys are searched against indexes of equal size; at any
//! score threshold the decoy count estimates the number of false targets
//! above it. q-values are the monotone minimum FDR at which each PSM would
//! be accepted.

use crate::scoring::Psm;

/// Assign q-values to a pooled set of target and decoy PSMs.
///
/// PSMs are sorted by XCorr descending; at each position the FDR is
/// `factor * D / (T + D)` over the cumulative counts, then a right-to-left
/// minimum pass makes q-values monotone. Tied scores receive identical
/// q-values. Returns the PSMs in descending score order.
pub fn assign_q_values(psms: &mut Vec<Psm>, decoy_factor: f64) {
    if psms.is_empty() {
        return;
    }
    psms.sort_by(|a, b| b.xcorr.total_cmp(&a.xcorr));

    let mut q = vec![0.0f64; psms.len()];
    let mut decoy = 0.0f64;
    let mut target = 0.0f64;
    for (idx, psm) in psms.iter().enumerate() {
        match psm.decoy {
            true => decoy += 1.0,
            false => target += 1.0,
        }
        q[idx] = match target + decoy > 0.0 {
            true => (decoy_factor * decoy) / (target + decoy),
            false => 0.0,
        };
    }

    // Q-value is the minimum FDR at any lower score threshold
    // `q = q[::-1].cummin()[::-1] in python`
    let mut q_min = f64::MAX;
    for value in q.iter_mut().rev() {
        q_min = q_min.min(*value);
        *value = q_min;
    }

    // A threshold equal to a tied score admits every member of the tie, so
    // the whole group shares the q-value computed at its last position
    let mut idx = 0;
    while idx < psms.len() {
        let mut end = idx + 1;
        while end < psms.len() && psms[end].xcorr == psms[idx].xcorr {
            end += 1;
        }
        for j in idx..end {
            psms[j].q_value = q[end - 1];
        }
        idx = end;
    }
}

/// Number of target PSMs at or below the q-value threshold
pub fn passing(psms: &[Psm], threshold: f64) -> usize {
    psms.iter()
        .filter(|psm| !psm.decoy && psm.q_value <= threshold)
        .count()
}

/// Retain target PSMs passing the q-value threshold
pub fn filter_passing(psms: Vec<Psm>, threshold: f64) -> Vec<Psm> {
    psms.into_iter()
        .filter(|psm| !psm.decoy && psm.q_value <= threshold)
        .collect()
}
