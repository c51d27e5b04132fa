use fnv::FnvHashSet;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::enzyme::{Enzyme, EnzymeParameters};
use crate::error::Error;
use crate::fasta::Fasta;
use crate::glycan::Glycan;
use crate::mass::{neutral_mass, ppm_error};
use crate::peptide::Peptide;

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
/// Parameters used for generating the candidate index
pub struct Builder {
    /// Cleavage rule name (default: trypsin)
    pub enzyme: Option<String>,
    /// How many missed cleavages to allow
    pub missed_cleavages: Option<u8>,
    /// Minimum peptide length (inclusive)
    pub min_peptide_len: Option<usize>,
    /// Maximum peptide length (inclusive)
    pub max_peptide_len: Option<usize>,
}

impl Builder {
    pub fn make_parameters(self) -> Parameters {
        Parameters {
            enzyme: self.enzyme.unwrap_or_else(|| "trypsin".into()),
            missed_cleavages: self.missed_cleavages.unwrap_or(2),
            min_peptide_len: self.min_peptide_len.unwrap_or(6),
            max_peptide_len: self.max_peptide_len.unwrap_or(40),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct Parameters {
    pub enzyme: String,
    pub missed_cleavages: u8,
    pub min_peptide_len: usize,
    pub max_peptide_len: usize,
}

impl Parameters {
    fn digest(&self, fasta: &Fasta, enzyme: &EnzymeParameters) -> Vec<Peptide> {
        fasta
            .proteins
            .par_iter()
            .flat_map_iter(|protein| {
                if let Err(e) = protein.check_residues() {
                    warn!("skipping protein: {}", e);
                    return Vec::new().into_iter();
                }
                enzyme
                    .digest(&protein.sequence, Arc::clone(&protein.accession))
                    .iter()
                    .filter_map(|digest| Peptide::try_from(digest).ok())
                    .collect::<Vec<_>>()
                    .into_iter()
            })
            .collect()
    }

    /// Build the target and decoy indexes from a protein database and a
    /// glycan library. Fatal if no sequon-bearing peptide pairs with any
    /// glycan.
    pub fn build(&self, fasta: &Fasta, glycans: Vec<Glycan>) -> Result<SearchDatabases, Error> {
        let enzyme = EnzymeParameters {
            missed_cleavages: self.missed_cleavages,
            min_len: self.min_peptide_len,
            max_len: self.max_peptide_len,
            enzyme: Enzyme::from_name(&self.enzyme)?,
        };

        let peptides = self.digest(fasta, &enzyme);
        let total = peptides.len();

        // Only sequon-bearing peptides can carry an N-glycan
        let targets: Vec<Peptide> = peptides
            .into_iter()
            .filter(|p| !p.sequons.is_empty())
            .collect();
        info!(
            "digested {} proteins into {} peptides, {} with sequons",
            fasta.proteins.len(),
            total,
            targets.len()
        );

        // A decoy that reverses onto a target sequence carries no
        // discriminating power and would corrupt the FDR estimate
        let target_sequences: FnvHashSet<Arc<[u8]>> =
            targets.iter().map(|p| Arc::clone(&p.sequence)).collect();
        let mut palindromic = 0usize;
        let decoys: Vec<Peptide> = targets
            .iter()
            .map(Peptide::reverse)
            .filter(|d| {
                let collides = target_sequences.contains(&d.sequence);
                palindromic += collides as usize;
                !collides
            })
            .collect();
        if palindromic > 0 {
            warn!("dropped {} palindromic decoy peptides", palindromic);
        }

        let target = IndexedDatabase::new(targets, glycans.clone(), false)?;
        let decoy = match IndexedDatabase::new(decoys, glycans, true) {
            Ok(db) => db,
            Err(Error::EmptyIndex) => {
                warn!("decoy index is empty; q-values will not be meaningful");
                IndexedDatabase::empty(true)
            }
            Err(e) => return Err(e),
        };

        info!(
            "indexed {} target and {} decoy glycopeptide candidates",
            target.candidates.len(),
            decoy.candidates.len()
        );

        Ok(SearchDatabases { target, decoy })
    }
}

#[derive(Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize)]
#[repr(transparent)]
pub struct PeptideIx(pub u32);

#[derive(Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize)]
#[repr(transparent)]
pub struct GlycanIx(pub u32);

/// One peptide-glycan pair with its precomputed neutral mass
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Candidate {
    pub monoisotopic: f64,
    pub peptide: PeptideIx,
    pub glycan: GlycanIx,
}

/// A candidate returned from a precursor mass-window query
#[derive(Copy, Clone, Debug)]
pub struct PrecursorMatch {
    pub candidate: Candidate,
    /// Signed mass error of the observed neutral mass vs the candidate
    pub ppm: f64,
    /// Charge assumed when computing the observed mass
    pub charge: u8,
}

/// Immutable mass-sorted index over the peptide x glycan product.
/// Concurrent queries from multiple threads are safe.
pub struct IndexedDatabase {
    pub peptides: Vec<Peptide>,
    pub glycans: Vec<Glycan>,
    /// Sorted by neutral mass, ascending; ties retain build order
    pub candidates: Vec<Candidate>,
    pub decoy: bool,
}

impl IndexedDatabase {
    fn new(peptides: Vec<Peptide>, glycans: Vec<Glycan>, decoy: bool) -> Result<Self, Error> {
        if peptides.is_empty() || glycans.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let mut candidates = peptides
            .par_iter()
            .enumerate()
            .flat_map_iter(|(i, peptide)| {
                glycans.iter().enumerate().map(move |(j, glycan)| Candidate {
                    monoisotopic: peptide.monoisotopic + glycan.monoisotopic,
                    peptide: PeptideIx(i as u32),
                    glycan: GlycanIx(j as u32),
                })
            })
            .collect::<Vec<_>>();

        // Stable sort, so that equal masses keep their build order and the
        // index is deterministic
        candidates.par_sort_by(|a, b| a.monoisotopic.total_cmp(&b.monoisotopic));

        Ok(Self {
            peptides,
            glycans,
            candidates,
            decoy,
        })
    }

    fn empty(decoy: bool) -> Self {
        Self {
            peptides: Vec::new(),
            glycans: Vec::new(),
            candidates: Vec::new(),
            decoy,
        }
    }

    /// All candidates whose neutral mass lies within `tolerance_ppm` of the
    /// observed neutral mass implied by (`precursor_mz`, `charge`), each
    /// annotated with its signed ppm error. Two binary searches bound the
    /// scan, so a query is O(log n + k).
    pub fn query(&self, precursor_mz: f64, charge: u8, tolerance_ppm: f64) -> Vec<PrecursorMatch> {
        let observed = neutral_mass(precursor_mz, charge);
        let window = observed * tolerance_ppm * 1E-6;
        let (lo, hi) = (observed - window, observed + window);

        let (left, right) = binary_search_slice(
            &self.candidates,
            |c, mass| c.monoisotopic.total_cmp(mass),
            lo,
            hi,
        );

        self.candidates[left..right]
            .iter()
            .filter(|c| c.monoisotopic >= lo && c.monoisotopic <= hi)
            .map(|c| PrecursorMatch {
                candidate: *c,
                ppm: ppm_error(observed, c.monoisotopic),
                charge,
            })
            .collect()
    }
}

pub struct SearchDatabases {
    pub target: IndexedDatabase,
    pub decoy: IndexedDatabase,
}

impl std::ops::Index<PeptideIx> for IndexedDatabase {
    type Output = Peptide;

    fn index(&self, index: PeptideIx) -> &Self::Output {
        &self.peptides[index.0 as usize]
    }
}

impl std::ops::Index<GlycanIx> for IndexedDatabase {
    type Output = Glycan;

    fn index(&self, index: GlycanIx) -> &Self::Output {
        &self.glycans[index.0 as usize]
    }
}

/// Return the widest `left` and `right` indices into a `slice` (sorted by the
/// function `key`) such that all values between `low` and `high` are
/// contained in `slice[left..right]`
///
/// # Invariants
///
/// * `slice[left] <= low || left == 0`
/// * `slice[right] <= high && (slice[right+1] > high || right == slice.len())`
/// * `0 <= left <= right <= slice.len()`
#[inline]
pub fn binary_search_slice<T, F, S>(slice: &[T], key: F, low: S, high: S) -> (usize, usize)
where
    F: Fn(&T, &S) -> Ordering,
{
    let left_idx = match slice.binary_search_by(|a| key(a, &low)) {
        Ok(idx) | Err(idx) => {
            let mut idx = idx.saturating_sub(1);
            while idx > 0 && key(&slice[idx], &low) != Ordering::Less {
                idx -= 1;
            }
            idx
        }
    };

    let right_idx = match slice[left_idx..].binary_search_by(|a| key(a, &high)) {
        Ok(idx) | Err(idx) => {
            let mut idx = idx + left_idx;
            while idx < slice.len() && key(&slice[idx], &high) != Ordering::Greater {
                idx = idx.saturating_add(1);
            }
            idx.min(slice.len())
        }
    };
    (left_idx, right_idx)
}
