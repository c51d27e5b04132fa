use std::fmt::Debug;
use std::sync::Arc;

use serde::Serialize;

use crate::enzyme::Digest;
use crate::error::Error;
use crate::mass::{monoisotopic, H2O};

/// Accession prefix applied to decoy peptides
pub const DECOY_TAG: &str = "DECOY_";

#[derive(Clone, PartialEq, Serialize)]
pub struct Peptide {
    pub decoy: bool,
    #[serde(skip_serializing)]
    pub sequence: Arc<[u8]>,
    /// Parent protein accession (`DECOY_`-prefixed for decoys)
    pub protein: Arc<str>,
    /// 1-based inclusive position of the first residue in the parent
    pub start: usize,
    /// 1-based inclusive position of the last residue in the parent
    pub end: usize,
    pub missed_cleavages: u8,
    /// Monoisotopic neutral mass
    pub monoisotopic: f64,
    /// 1-based positions of the N in each N-X-S/T (X != P) motif
    pub sequons: Vec<u16>,
}

impl Peptide {
    pub fn label(&self) -> i32 {
        match self.decoy {
            true => -1,
            false => 1,
        }
    }

    /// Scan for N-glycosylation sequons: N at position i (1-based) with a
    /// following residue that is not P and an S or T two residues on
    pub fn sequon_positions(sequence: &[u8]) -> Vec<u16> {
        let mut sequons = Vec::new();
        for i in 0..sequence.len().saturating_sub(2) {
            if sequence[i] == b'N'
                && sequence[i + 1] != b'P'
                && (sequence[i + 2] == b'S' || sequence[i + 2] == b'T')
            {
                sequons.push(i as u16 + 1);
            }
        }
        sequons
    }

    /// Generate the decoy counterpart: first and last residues stay in
    /// place (preserving the enzymatic terminus) and the interior is
    /// reversed. Mass and length are unchanged; sequons are recomputed on
    /// the reversed sequence.
    pub fn reverse(&self) -> Peptide {
        let mut sequence = Vec::from(self.sequence.as_ref());
        let n = sequence.len().saturating_sub(1);
        if n > 1 {
            sequence[1..n].reverse();
        }
        let sequons = Self::sequon_positions(&sequence);
        Peptide {
            decoy: !self.decoy,
            sequence: Arc::from(sequence.into_boxed_slice()),
            protein: Arc::from(format!("{}{}", DECOY_TAG, self.protein)),
            start: self.start,
            end: self.end,
            missed_cleavages: self.missed_cleavages,
            monoisotopic: self.monoisotopic,
            sequons,
        }
    }

    /// A decoy whose reversal reproduced the target sequence carries no
    /// discriminating power
    pub fn is_palindromic(&self, other: &Peptide) -> bool {
        self.sequence == other.sequence
    }
}

impl TryFrom<&Digest> for Peptide {
    type Error = Error;

    fn try_from(digest: &Digest) -> Result<Self, Error> {
        let mut mass = H2O;
        for (idx, residue) in digest.sequence.bytes().enumerate() {
            let mono = monoisotopic(residue);
            if mono == 0.0 {
                return Err(Error::InvalidSequence {
                    protein: digest.protein.to_string(),
                    residue: residue as char,
                    position: digest.start_position + idx,
                });
            }
            mass += mono;
        }

        let sequence: Arc<[u8]> = Arc::from(digest.sequence.as_bytes());
        let sequons = Self::sequon_positions(&sequence);

        Ok(Peptide {
            decoy: false,
            sequence,
            protein: digest.protein.clone(),
            start: digest.start_position,
            end: digest.end_position,
            missed_cleavages: digest.missed_cleavages,
            monoisotopic: mass,
            sequons,
        })
    }
}

impl Debug for Peptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peptide")
            .field("sequence", &self.to_string())
            .field("protein", &self.protein)
            .field("decoy", &self.decoy)
            .field("monoisotopic", &self.monoisotopic)
            .field("sequons", &self.sequons)
            .finish()
    }
}

impl std::fmt::Display for Peptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(std::str::from_utf8(&self.sequence).map_err(|_| std::fmt::Error)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn digest(s: &str) -> Digest {
        Digest {
            sequence: s.into(),
            protein: Arc::from("P1"),
            missed_cleavages: 0,
            start_position: 1,
            end_position: s.len(),
        }
    }

    fn peptide(s: &str) -> Peptide {
        Peptide::try_from(&digest(s)).unwrap()
    }

    #[test]
    fn mass() {
        // NGTDEK = N + G + T + D + E + K + H2O
        let p = peptide("NGTDEK");
        let expected =
            114.04293 + 57.02146 + 101.04768 + 115.02694 + 129.04259 + 128.09496 + H2O;
        assert!((p.monoisotopic - expected).abs() < 1E-9);
    }

    #[test]
    fn sequons() {
        assert_eq!(peptide("NGTDEK").sequons, vec![1]);
        // N followed by P never qualifies
        assert_eq!(peptide("NPTDEK").sequons, Vec::<u16>::new());
        // motif requires S or T two residues after the N
        assert_eq!(peptide("NGADEK").sequons, Vec::<u16>::new());
        // two overlapping motifs
        assert_eq!(peptide("NNTSEK").sequons, vec![1, 2]);
        // N too close to the C-terminus
        assert_eq!(peptide("GGGGNT").sequons, Vec::<u16>::new());
        assert_eq!(peptide("GGNTSK").sequons, vec![3]);
    }

    #[test]
    fn invalid_residue() {
        let d = Digest {
            sequence: "NGTZEK".into(),
            protein: Arc::from("P1"),
            missed_cleavages: 0,
            start_position: 10,
            end_position: 15,
        };
        match Peptide::try_from(&d) {
            Err(Error::InvalidSequence { position, residue, .. }) => {
                assert_eq!(residue, 'Z');
                // position reported in protein coordinates
                assert_eq!(position, 13);
            }
            _ => panic!("expected InvalidSequence"),
        }
    }

    #[test]
    fn decoy_reversal() {
        let target = peptide("ACDEFK");
        let decoy = target.reverse();
        assert_eq!(decoy.to_string(), "AFEDCK");
        assert!(decoy.decoy);
        assert_eq!(&*decoy.protein, "DECOY_P1");
        assert!((decoy.monoisotopic - target.monoisotopic).abs() < 1E-9);
        assert_eq!(decoy.start, target.start);
        assert_eq!(decoy.end, target.end);
    }

    #[test]
    fn decoy_sequons_recomputed() {
        // NGSAEK reversed inside termini -> NEASGK: the sequon vanishes
        let target = peptide("NGSAEK");
        assert_eq!(target.sequons, vec![1]);
        let decoy = target.reverse();
        assert_eq!(decoy.to_string(), "NEASGK");
        assert_eq!(decoy.sequons, Vec::<u16>::new());
    }

    #[test]
    fn palindromic_decoy() {
        let target = peptide("AGGA");
        let decoy = target.reverse();
        assert!(decoy.is_palindromic(&target));
    }

    #[quickcheck]
    fn decoy_preserves_mass_length_and_termini(seq: Vec<u8>) -> bool {
        let bytes: Vec<u8> = seq
            .into_iter()
            .map(|b| crate::mass::VALID_AA[b as usize % crate::mass::VALID_AA.len()])
            .collect();
        if bytes.len() < 2 {
            return true;
        }
        let target = peptide(std::str::from_utf8(&bytes).unwrap());
        let decoy = target.reverse();
        decoy.sequence.len() == target.sequence.len()
            && (decoy.monoisotopic - target.monoisotopic).abs() < 1E-9
            && decoy.sequence[0] == target.sequence[0]
            && decoy.sequence[bytes.len() - 1] == target.sequence[bytes.len() - 1]
    }
}
