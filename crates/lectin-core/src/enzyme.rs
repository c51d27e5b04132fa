use fnv::FnvHashSet;
use regex::Regex;
use std::sync::Arc;

use crate::error::Error;
use crate::mass::VALID_AA;

/// An enzymatic digest of a protein subsequence
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Digest {
    /// Cleaved peptide sequence
    pub sequence: String,
    /// Protein accession
    pub protein: Arc<str>,
    /// Missed cleavages
    pub missed_cleavages: u8,
    /// What residue position does this start at (1-based inclusive)?
    pub start_position: usize,
    /// What residue position does this end at (1-based inclusive)?
    pub end_position: usize,
}

/// A cleavage rule: the residues cleaved after, and an optional residue
/// that blocks cleavage when it follows the site (e.g. proline for trypsin)
#[derive(Clone, Debug)]
pub struct Enzyme {
    pub name: String,
    // Skip cleaving if the site is followed by a residue matching this
    pub skip_suffix: Option<char>,
    // Regex for matching cleavage sites
    regex: Regex,
}

impl Enzyme {
    pub fn new(name: &str, cleave: &str, skip_suffix: Option<char>) -> Self {
        assert!(
            cleave.chars().all(|x| VALID_AA.contains(&(x as u8))),
            "enzyme cleavage sequence contains non-amino acid characters: {}",
            cleave
        );
        Enzyme {
            name: name.into(),
            regex: Regex::new(&format!("[{}]", cleave)).unwrap(),
            skip_suffix,
        }
    }

    /// Look up a cleavage rule by name. Recognized rules: trypsin,
    /// chymotrypsin, pepsin, lys-c, arg-c, glu-c.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        let lower = name.to_ascii_lowercase();
        let (cleave, skip) = match lower.as_str() {
            "trypsin" => ("KR", Some('P')),
            "chymotrypsin" => ("FWY", None),
            "pepsin" => ("FL", None),
            "lys-c" | "lysc" => ("K", None),
            "arg-c" | "argc" => ("R", None),
            "glu-c" | "gluc" => ("DE", None),
            _ => return Err(Error::UnknownEnzyme(name.into())),
        };
        Ok(Enzyme::new(&lower, cleave, skip))
    }

    /// Ordered cleavage points for `sequence`, including position 0 and the
    /// sequence length. A span between adjacent points is a fully-cleaved
    /// peptide.
    pub fn cleavage_points(&self, sequence: &str) -> Vec<usize> {
        let mut points = vec![0];
        for mat in self.regex.find_iter(sequence) {
            let site = mat.end();
            if let Some(skip) = self.skip_suffix {
                if site < sequence.len() && sequence[site..].starts_with(skip) {
                    continue;
                }
            }
            if site < sequence.len() {
                points.push(site);
            }
        }
        points.push(sequence.len());
        points
    }
}

pub struct EnzymeParameters {
    /// Number of missed cleavages to produce
    pub missed_cleavages: u8,
    /// Inclusive
    pub min_len: usize,
    /// Inclusive
    pub max_len: usize,
    pub enzyme: Enzyme,
}

impl EnzymeParameters {
    /// Digest a protein sequence, emitting every span covering up to
    /// `missed_cleavages` interior cleavage sites and passing the length
    /// filter. Repeated occurrences of the same peptide within one protein
    /// are emitted once.
    pub fn digest(&self, sequence: &str, protein: Arc<str>) -> Vec<Digest> {
        let points = self.enzyme.cleavage_points(sequence);
        let mut seen = FnvHashSet::default();
        let mut digests = Vec::new();

        for k in 0..=self.missed_cleavages as usize {
            for win in points.windows(k + 2) {
                let (start, end) = (win[0], win[k + 1]);
                let sequence = match sequence.get(start..end) {
                    Some(s) => s,
                    None => continue,
                };
                let len = sequence.len();
                if len >= self.min_len && len <= self.max_len && seen.insert(sequence) {
                    digests.push(Digest {
                        sequence: sequence.into(),
                        protein: protein.clone(),
                        missed_cleavages: k as u8,
                        start_position: start + 1,
                        end_position: end,
                    });
                }
            }
        }
        digests
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn digest_sequences(params: &EnzymeParameters, sequence: &str) -> Vec<String> {
        params
            .digest(sequence, Arc::from(""))
            .into_iter()
            .map(|d| d.sequence)
            .collect()
    }

    #[test]
    fn trypsin() {
        let sequence = "MADEEKLPPGWEKRMSRSSGRVYYFNHITNASQWERPSGN";
        // the lone "R" at position 14 is dropped by the length filter
        let expected = vec![
            ("MADEEK", 1, 6),
            ("LPPGWEK", 7, 13),
            ("MSR", 15, 17),
            ("SSGR", 18, 21),
            ("VYYFNHITNASQWERPSGN", 22, 40),
        ];

        let tryp = EnzymeParameters {
            min_len: 2,
            max_len: 50,
            missed_cleavages: 0,
            enzyme: Enzyme::from_name("trypsin").unwrap(),
        };

        assert_eq!(
            expected
                .into_iter()
                .map(|(s, a, b)| (s.to_string(), a, b))
                .collect::<Vec<_>>(),
            tryp.digest(sequence, Arc::from(""))
                .into_iter()
                .map(|d| (d.sequence, d.start_position, d.end_position))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn trypsin_missed_cleavage() {
        let sequence = "MADEEKLPPGWEKRMSRSSGRVYYFNHITNASQWERPSGN";
        let expected = vec![
            "MADEEK",
            "LPPGWEK",
            "R",
            "MSR",
            "SSGR",
            "VYYFNHITNASQWERPSGN",
            "MADEEKLPPGWEK",
            "LPPGWEKR",
            "RMSR",
            "MSRSSGR",
            "SSGRVYYFNHITNASQWERPSGN",
        ];

        let tryp = EnzymeParameters {
            min_len: 1,
            max_len: 50,
            missed_cleavages: 1,
            enzyme: Enzyme::from_name("trypsin").unwrap(),
        };

        assert_eq!(expected, digest_sequences(&tryp, sequence));
    }

    #[test]
    fn trypsin_missed_cleavage_2() {
        let sequence = "MADEEKLPPGWEKRMSRSSGRVYYFNHITNASQWERPSGN";
        let expected = vec![
            "MADEEK",
            "LPPGWEK",
            "R",
            "MSR",
            "SSGR",
            "VYYFNHITNASQWERPSGN",
            "MADEEKLPPGWEK",
            "LPPGWEKR",
            "RMSR",
            "MSRSSGR",
            "SSGRVYYFNHITNASQWERPSGN",
            "MADEEKLPPGWEKR",
            "LPPGWEKRMSR",
            "RMSRSSGR",
            "MSRSSGRVYYFNHITNASQWERPSGN",
        ];

        let tryp = EnzymeParameters {
            min_len: 1,
            max_len: 50,
            missed_cleavages: 2,
            enzyme: Enzyme::from_name("trypsin").unwrap(),
        };

        assert_eq!(expected, digest_sequences(&tryp, sequence));
    }

    #[test]
    fn trypsin_proline_block() {
        // R followed by P is not a cleavage site
        let sequence = "MKRPGEK";
        let tryp = EnzymeParameters {
            min_len: 1,
            max_len: 50,
            missed_cleavages: 0,
            enzyme: Enzyme::from_name("trypsin").unwrap(),
        };
        assert_eq!(vec!["MK", "RPGEK"], digest_sequences(&tryp, sequence));
    }

    #[test]
    fn glu_c() {
        let sequence = "MADEEKLPPGWEK";
        let gluc = EnzymeParameters {
            min_len: 1,
            max_len: 50,
            missed_cleavages: 0,
            enzyme: Enzyme::from_name("glu-c").unwrap(),
        };
        // the repeated "E" peptide is emitted once
        assert_eq!(
            vec!["MAD", "E", "KLPPGWE", "K"],
            digest_sequences(&gluc, sequence)
        );
    }

    #[test]
    fn ensure_unique() {
        let sequence = "KVEGAQNQGKKVEGAQNQGK";
        let expected = vec!["K", "VEGAQNQGK"];

        let tryp = EnzymeParameters {
            min_len: 1,
            max_len: usize::MAX,
            missed_cleavages: 0,
            enzyme: Enzyme::new("trypsin", "KR", None),
        };

        assert_eq!(expected, digest_sequences(&tryp, sequence));
    }

    #[test]
    fn unknown_enzyme() {
        assert!(matches!(
            Enzyme::from_name("proteinase-x"),
            Err(Error::UnknownEnzyme(_))
        ));
    }

    #[test]
    fn short_protein() {
        let tryp = EnzymeParameters {
            min_len: 2,
            max_len: 30,
            missed_cleavages: 0,
            enzyme: Enzyme::from_name("trypsin").unwrap(),
        };
        assert_eq!(vec!["MK", "NGTDEK"], digest_sequences(&tryp, "MKNGTDEK"));

        // a tighter length filter removes the dipeptide
        let tryp = EnzymeParameters {
            min_len: 3,
            max_len: 30,
            missed_cleavages: 0,
            enzyme: Enzyme::from_name("trypsin").unwrap(),
        };
        assert_eq!(vec!["NGTDEK"], digest_sequences(&tryp, "MKNGTDEK"));
    }

    #[test]
    fn tryptic_termini() {
        // every digest either starts the protein or follows an unblocked
        // K/R cleavage site
        let sequence = "MADEEKLPPGWEKRMSRSSGRVYYFNHITNASQWERPSGNKRPAK";
        let bytes = sequence.as_bytes();
        let tryp = EnzymeParameters {
            min_len: 1,
            max_len: 50,
            missed_cleavages: 2,
            enzyme: Enzyme::from_name("trypsin").unwrap(),
        };
        for digest in tryp.digest(sequence, Arc::from("")) {
            let start = digest.start_position;
            if start > 1 {
                let preceding = bytes[start - 2];
                assert!(preceding == b'K' || preceding == b'R', "{}", digest.sequence);
                assert_ne!(bytes[start - 1], b'P', "{}", digest.sequence);
            }
            let end = digest.end_position;
            if end < sequence.len() {
                let last = bytes[end - 1];
                assert!(last == b'K' || last == b'R', "{}", digest.sequence);
            }
        }
    }

    #[test]
    fn interior_sites_bounded_by_parameter() {
        let sequence = "MADEEKLPPGWEKRMSRSSGRVYYFNHITNASQWERPSGN";
        for m in 0..3u8 {
            let tryp = EnzymeParameters {
                min_len: 1,
                max_len: 50,
                missed_cleavages: m,
                enzyme: Enzyme::from_name("trypsin").unwrap(),
            };
            for digest in tryp.digest(sequence, Arc::from("")) {
                assert!(digest.missed_cleavages <= m, "{}", digest.sequence);
            }
        }
    }
}
