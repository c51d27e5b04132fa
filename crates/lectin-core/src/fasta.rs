use std::sync::Arc;

use crate::error::Error;
use crate::mass::monoisotopic;

#[derive(Clone, Debug)]
pub struct Protein {
    /// Accession, e.g. a UniProt identifier
    pub accession: Arc<str>,
    /// Remainder of the header line
    pub description: String,
    /// Amino acid sequence
    pub sequence: String,
}

impl Protein {
    /// Check that every residue has a defined monoisotopic mass, reporting
    /// the 1-based position of the first offender
    pub fn check_residues(&self) -> Result<(), Error> {
        for (idx, residue) in self.sequence.bytes().enumerate() {
            if monoisotopic(residue) == 0.0 {
                return Err(Error::InvalidSequence {
                    protein: self.accession.to_string(),
                    residue: residue as char,
                    position: idx + 1,
                });
            }
        }
        Ok(())
    }
}

pub struct Fasta {
    pub proteins: Vec<Protein>,
}

impl Fasta {
    /// Parse FASTA-formatted text into a protein list
    pub fn parse(contents: &str) -> Fasta {
        let mut proteins = Vec::new();
        let mut last_header = "";
        let mut s = String::new();

        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('>') {
                if !s.is_empty() {
                    proteins.push(Self::make_protein(last_header, std::mem::take(&mut s)));
                }
                last_header = header;
            } else {
                s.push_str(line.trim());
            }
        }
        if !s.is_empty() {
            proteins.push(Self::make_protein(last_header, s));
        }

        Fasta { proteins }
    }

    fn make_protein(header: &str, sequence: String) -> Protein {
        let mut parts = header.splitn(2, char::is_whitespace);
        let accession: Arc<str> = Arc::from(parts.next().unwrap_or_default());
        let description = parts.next().unwrap_or_default().trim().to_string();
        Protein {
            accession,
            description,
            sequence,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse() {
        let contents = ">sp|P12345|TEST_HUMAN Test protein\nMKNGTDEK\nACDEFK\n\n>P67890\nPEPTIDEK";
        let fasta = Fasta::parse(contents);
        assert_eq!(fasta.proteins.len(), 2);
        assert_eq!(&*fasta.proteins[0].accession, "sp|P12345|TEST_HUMAN");
        assert_eq!(fasta.proteins[0].description, "Test protein");
        assert_eq!(fasta.proteins[0].sequence, "MKNGTDEKACDEFK");
        assert_eq!(&*fasta.proteins[1].accession, "P67890");
        assert_eq!(fasta.proteins[1].description, "");
        assert_eq!(fasta.proteins[1].sequence, "PEPTIDEK");
    }

    #[test]
    fn invalid_residue_position() {
        let fasta = Fasta::parse(">P1\nMKNXGTDEK");
        let err = fasta.proteins[0].check_residues().unwrap_err();
        match err {
            Error::InvalidSequence {
                protein,
                residue,
                position,
            } => {
                assert_eq!(protein, "P1");
                assert_eq!(residue, 'X');
                assert_eq!(position, 4);
            }
            _ => panic!("wrong error kind"),
        }
    }
}
