use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use log::{info, trace, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::database::SearchDatabases;
use crate::error::Error;
use crate::fdr;
use crate::scoring::{Psm, Scorer, TheoreticalCache};
use crate::spectrum::{RawSpectrum, SpectrumProcessor};
use crate::theoretical::TheoreticalBuilder;
use crate::xcorr::XcorrEngine;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// MS level was not 2
    NotMsn,
    /// No precursor m/z was selected
    MissingPrecursor,
    /// Structural invariants violated
    Malformed,
    /// Every peak was removed during preprocessing
    NoPeaks,
    /// The run was cancelled before this spectrum was taken
    Cancelled,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotMsn => "not_msn",
            SkipReason::MissingPrecursor => "missing_precursor",
            SkipReason::Malformed => "malformed",
            SkipReason::NoPeaks => "no_peaks",
            SkipReason::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SkippedSpectrum {
    pub id: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ScoreSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ScoreSummary {
    fn from_scores(scores: &[f64]) -> Self {
        match scores.iter().copied().minmax().into_option() {
            Some((min, max)) => ScoreSummary {
                min,
                max,
                mean: scores.iter().sum::<f64>() / scores.len() as f64,
            },
            None => ScoreSummary::default(),
        }
    }
}

/// Accounting for a completed (or cancelled) search run
#[derive(Clone, Debug, Default, Serialize)]
pub struct SearchSummary {
    pub total_spectra: usize,
    /// Spectra that went through the full scoring pipeline
    pub searched: usize,
    /// Searched spectra with no candidates in the precursor window
    pub no_candidates: usize,
    pub target_psms: usize,
    pub decoy_psms: usize,
    /// Target PSMs passing the q-value threshold; 0 if cancelled
    pub passing_psms: usize,
    pub cancelled: bool,
    /// XCorr distribution over rank-1 target PSMs
    pub target_xcorr: ScoreSummary,
    pub skipped: Vec<SkippedSpectrum>,
}

pub struct SearchResults {
    pub psms: Vec<Psm>,
    pub summary: SearchSummary,
}

enum Outcome {
    Scored(Vec<Psm>),
    NoCandidates,
    Skipped(SkippedSpectrum),
}

/// Per-worker scratch: FFT plans and theoretical-vector memoization are
/// never shared across threads
struct WorkerState {
    engine: XcorrEngine,
    target_cache: TheoreticalCache,
    decoy_cache: TheoreticalCache,
}

/// Drives spectra through preprocessing, candidate generation, two-stage
/// scoring against the target and decoy indexes, and q-value assignment.
pub struct Searcher<'db> {
    pub databases: &'db SearchDatabases,
    pub processor: SpectrumProcessor,
    pub builder: TheoreticalBuilder,
    pub tolerance_ppm: f64,
    pub sp_top_k: usize,
    pub report_psms: usize,
    pub fdr_threshold: f64,
    pub decoy_factor: f64,
    cancelled: Arc<AtomicBool>,
}

impl<'db> Searcher<'db> {
    pub fn new(
        databases: &'db SearchDatabases,
        processor: SpectrumProcessor,
        builder: TheoreticalBuilder,
        tolerance_ppm: f64,
        sp_top_k: usize,
        report_psms: usize,
        fdr_threshold: f64,
        decoy_factor: f64,
    ) -> Self {
        Self {
            databases,
            processor,
            builder,
            tolerance_ppm,
            sp_top_k,
            report_psms,
            fdr_threshold,
            decoy_factor,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between spectra; setting it lets in-flight spectra
    /// finish, then drains the rest unprocessed
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn scorer(&self, decoy: bool) -> Scorer<'_> {
        Scorer {
            db: match decoy {
                false => &self.databases.target,
                true => &self.databases.decoy,
            },
            builder: self.builder,
            tolerance_ppm: self.tolerance_ppm,
            sp_top_k: self.sp_top_k,
            report_psms: self.report_psms,
        }
    }

    fn process_one(&self, state: &mut WorkerState, spectrum: &RawSpectrum) -> Result<Outcome, Error> {
        let skip = |reason| {
            Ok(Outcome::Skipped(SkippedSpectrum {
                id: spectrum.id.clone(),
                reason,
            }))
        };

        if self.cancelled.load(Ordering::Relaxed) {
            return skip(SkipReason::Cancelled);
        }
        if spectrum.ms_level != 2 {
            return skip(SkipReason::NotMsn);
        }
        if spectrum.precursor_mz.is_none() {
            return skip(SkipReason::MissingPrecursor);
        }

        let query = match self.processor.process(spectrum) {
            Ok(query) => query,
            Err(Error::MalformedSpectrum { id, reason }) => {
                warn!("skipping malformed spectrum {}: {}", id, reason);
                return skip(SkipReason::Malformed);
            }
            Err(e) => return Err(e),
        };
        if query.peaks_kept == 0 {
            return skip(SkipReason::NoPeaks);
        }

        // The same preprocessed spectrum is scored against both indexes
        let mut psms =
            self.scorer(false)
                .score(&query, &mut state.engine, &mut state.target_cache)?;
        psms.extend(
            self.scorer(true)
                .score(&query, &mut state.engine, &mut state.decoy_cache)?,
        );

        match psms.is_empty() {
            true => Ok(Outcome::NoCandidates),
            false => Ok(Outcome::Scored(psms)),
        }
    }

    /// Search a batch of spectra. Input order is not preserved in the PSM
    /// stream; every PSM carries its scan id.
    pub fn run(&self, spectra: &[RawSpectrum]) -> Result<SearchResults, Error> {
        if self.databases.target.candidates.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let start = Instant::now();
        let counter = AtomicUsize::new(0);
        let bins = self.processor.grid.bins;

        let outcomes = spectra
            .par_iter()
            .map_init(
                || WorkerState {
                    engine: XcorrEngine::new(bins),
                    target_cache: TheoreticalCache::default(),
                    decoy_cache: TheoreticalCache::default(),
                },
                |state, spectrum| {
                    let prev = counter.fetch_add(1, Ordering::Relaxed);
                    if prev > 0 && prev % 10_000 == 0 {
                        let duration = start.elapsed().as_millis() as usize;
                        let rate = prev * 1000 / (duration + 1);
                        trace!(" - searched {} spectra ({} spectra/s)", prev, rate);
                    }
                    self.process_one(state, spectrum)
                },
            )
            .collect::<Result<Vec<Outcome>, Error>>()?;

        let mut psms = Vec::new();
        let mut summary = SearchSummary {
            total_spectra: spectra.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Scored(batch) => {
                    summary.searched += 1;
                    psms.extend(batch);
                }
                Outcome::NoCandidates => {
                    summary.searched += 1;
                    summary.no_candidates += 1;
                }
                Outcome::Skipped(skipped) => summary.skipped.push(skipped),
            }
        }

        let duration = start.elapsed().as_millis() as usize;
        let rate = summary.searched * 1000 / (duration + 1);
        info!(
            " - search: {:8} ms ({} spectra/s)",
            duration, rate
        );

        summary.cancelled = self.cancelled.load(Ordering::Relaxed);
        summary.target_psms = psms.iter().filter(|p| !p.decoy && p.rank == 1).count();
        summary.decoy_psms = psms.iter().filter(|p| p.decoy && p.rank == 1).count();
        summary.target_xcorr = ScoreSummary::from_scores(
            &psms
                .iter()
                .filter(|p| !p.decoy && p.rank == 1)
                .map(|p| p.xcorr)
                .collect::<Vec<_>>(),
        );

        // FDR is a global reduction over the best PSM per spectrum from
        // each population; a cancelled run yields PSMs without q-values
        if summary.cancelled {
            warn!("search cancelled; q-values were not computed");
        } else {
            let mut best: Vec<Psm> = psms.iter().filter(|p| p.rank == 1).cloned().collect();
            fdr::assign_q_values(&mut best, self.decoy_factor);
            summary.passing_psms = fdr::passing(&best, self.fdr_threshold);
            // fold assigned q-values back into the full PSM set
            let lookup: fnv::FnvHashMap<(&str, bool), f64> = best
                .iter()
                .map(|p| ((p.spec_id.as_str(), p.decoy), p.q_value))
                .collect();
            for psm in psms.iter_mut() {
                if psm.rank == 1 {
                    if let Some(&q) = lookup.get(&(psm.spec_id.as_str(), psm.decoy)) {
                        psm.q_value = q;
                    }
                }
            }
            info!(
                "discovered {} target PSMs at q <= {}",
                summary.passing_psms, self.fdr_threshold
            );
        }

        Ok(SearchResults { psms, summary })
    }
}
