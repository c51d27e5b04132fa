use fnv::FnvHashMap;
use serde::Serialize;

use crate::database::{GlycanIx, IndexedDatabase, PeptideIx, PrecursorMatch};
use crate::error::Error;
use crate::glycan::GlycanClass;
use crate::mass::neutral_mass;
use crate::spectrum::ProcessedSpectrum;
use crate::theoretical::TheoreticalBuilder;
use crate::xcorr::XcorrEngine;

/// Charge states assumed for precursors reported without one
pub const UNKNOWN_CHARGE_STATES: [u8; 3] = [2, 3, 4];

/// Preliminary intensity-weighted shared-peak score
#[derive(Copy, Clone, Debug, Default, Serialize)]
pub struct SpScore {
    /// Sum of observed-bin x theoretical-bin products over shared bins
    pub score: f64,
    /// Bins where both vectors are non-zero
    pub matched: usize,
}

/// Sp is cheap: a masked dot product over bins the theoretical vector
/// occupies. It exists only to rank candidates before cross-correlation.
pub fn sp_score(observed: &[f64], theoretical: &[f64]) -> SpScore {
    let mut score = 0.0;
    let mut matched = 0;
    for (&o, &t) in observed.iter().zip(theoretical.iter()) {
        if t > 0.0 && o > 0.0 {
            score += o * t;
            matched += 1;
        }
    }
    SpScore { score, matched }
}

/// A peptide-glycan-spectrum match
#[derive(Clone, Debug, Serialize)]
pub struct Psm {
    /// Spectrum scan identifier
    pub spec_id: String,
    /// Peptide sequence
    pub peptide: String,
    /// Parent protein accession (`DECOY_`-prefixed for decoys)
    pub protein: String,
    /// Glycan composition
    pub glycan: String,
    pub glycan_class: GlycanClass,
    /// Rank within the spectrum (1 = best)
    pub rank: u32,
    pub decoy: bool,
    /// Observed neutral mass
    pub expmass: f64,
    /// Candidate neutral mass
    pub calcmass: f64,
    /// Charge used for the mass-window query
    pub charge: u8,
    /// Retention time in seconds
    pub rt: f64,
    /// Signed precursor mass error
    pub ppm_error: f64,
    pub missed_cleavages: u8,
    pub sp: f64,
    pub matched_peaks: u32,
    pub xcorr: f64,
    /// Assigned by the FDR engine; 1.0 until then
    pub q_value: f64,
}

impl Psm {
    pub fn label(&self) -> i32 {
        match self.decoy {
            true => -1,
            false => 1,
        }
    }
}

/// Per-worker memoization of theoretical vectors, keyed by candidate
/// identity. Workers never share a cache, so no synchronization is needed.
#[derive(Default)]
pub struct TheoreticalCache {
    vectors: FnvHashMap<(PeptideIx, GlycanIx), Vec<f64>>,
}

impl TheoreticalCache {
    pub fn vector(
        &mut self,
        db: &IndexedDatabase,
        builder: &TheoreticalBuilder,
        peptide: PeptideIx,
        glycan: GlycanIx,
    ) -> &[f64] {
        self.vectors
            .entry((peptide, glycan))
            .or_insert_with(|| builder.vector(&db[peptide], &db[glycan]))
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Scores spectra against one candidate index
pub struct Scorer<'db> {
    pub db: &'db IndexedDatabase,
    pub builder: TheoreticalBuilder,
    /// Precursor mass window half-width, ppm
    pub tolerance_ppm: f64,
    /// Candidates retained after preliminary scoring
    pub sp_top_k: usize,
    /// PSMs reported per spectrum
    pub report_psms: usize,
}

struct Prelim {
    hit: PrecursorMatch,
    sp: SpScore,
}

impl<'db> Scorer<'db> {
    /// Score one preprocessed spectrum: query the index at the precursor
    /// mass, rank candidates by Sp, cross-correlate the top k, and report
    /// the best-scoring PSMs. An empty vector means no candidates matched.
    pub fn score(
        &self,
        query: &ProcessedSpectrum,
        engine: &mut XcorrEngine,
        cache: &mut TheoreticalCache,
    ) -> Result<Vec<Psm>, Error> {
        let precursor_mz = match query.precursor_mz {
            Some(mz) => mz,
            None => return Ok(Vec::new()),
        };

        let hits = match query.precursor_charge {
            // Charge state annotated: a single query suffices
            z if z >= 1 => self.db.query(precursor_mz, z, self.tolerance_ppm),
            // Unknown charge: search the plausible states and pool
            _ => UNKNOWN_CHARGE_STATES
                .iter()
                .flat_map(|&z| self.db.query(precursor_mz, z, self.tolerance_ppm))
                .collect(),
        };
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let mut prelim = hits
            .into_iter()
            .filter_map(|hit| {
                let t = cache.vector(self.db, &self.builder, hit.candidate.peptide, hit.candidate.glycan);
                let sp = sp_score(&query.intensities, t);
                match sp.matched > 0 {
                    true => Some(Prelim { hit, sp }),
                    false => None,
                }
            })
            .collect::<Vec<_>>();

        // Only the top k by Sp proceed to cross-correlation
        prelim.sort_unstable_by(|a, b| b.sp.score.total_cmp(&a.sp.score));
        prelim.truncate(self.sp_top_k);

        let mut scored = Vec::with_capacity(prelim.len());
        for p in prelim {
            let t = cache.vector(self.db, &self.builder, p.hit.candidate.peptide, p.hit.candidate.glycan);
            let xcorr = engine.score(&query.intensities, t)?;
            scored.push((p, xcorr));
        }
        scored.sort_unstable_by(|a, b| b.1.xcorr.total_cmp(&a.1.xcorr));

        let psms = scored
            .iter()
            .take(self.report_psms)
            .enumerate()
            .map(|(idx, (p, xcorr))| {
                let peptide = &self.db[p.hit.candidate.peptide];
                let glycan = &self.db[p.hit.candidate.glycan];
                Psm {
                    spec_id: query.id.clone(),
                    peptide: peptide.to_string(),
                    protein: peptide.protein.to_string(),
                    glycan: glycan.composition.clone(),
                    glycan_class: glycan.class,
                    rank: idx as u32 + 1,
                    decoy: peptide.decoy,
                    expmass: neutral_mass(precursor_mz, p.hit.charge),
                    calcmass: p.hit.candidate.monoisotopic,
                    charge: p.hit.charge,
                    rt: query.scan_start_time,
                    ppm_error: p.hit.ppm,
                    missed_cleavages: peptide.missed_cleavages,
                    sp: p.sp.score,
                    matched_peaks: xcorr.matched_peaks as u32,
                    xcorr: xcorr.xcorr,
                    q_value: 1.0,
                }
            })
            .collect();

        Ok(psms)
    }
}
