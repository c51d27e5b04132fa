use serde::Serialize;

use crate::mass::monoisotopic;
use crate::peptide::Peptide;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Serialize)]
pub enum Kind {
    B,
    Y,
}

/// Theoretical backbone fragment
#[derive(Copy, Clone, Debug)]
pub struct Ion {
    pub kind: Kind,
    /// Fragment index: b_i counts from the N-terminus, y_i from the
    /// C-terminus (1-based)
    pub index: usize,
    /// Neutral fragment mass; y ions include the C-terminal water
    pub monoisotopic_mass: f64,
}

/// Generate b/y ions for a peptide by accumulating residue masses.
/// b ions are produced in increasing index order, y ions in decreasing
/// index order (y_{L-1} first).
pub struct IonSeries<'p> {
    pub kind: Kind,
    cumulative_mass: f64,
    peptide: &'p Peptide,
    idx: usize,
}

impl<'p> IonSeries<'p> {
    pub fn new(peptide: &'p Peptide, kind: Kind) -> Self {
        let cumulative_mass = match kind {
            Kind::B => 0.0,
            // peptide mass includes water, so y ions carry it implicitly
            Kind::Y => peptide.monoisotopic,
        };
        Self {
            kind,
            cumulative_mass,
            peptide,
            idx: 0,
        }
    }
}

impl<'p> Iterator for IonSeries<'p> {
    type Item = Ion;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.peptide.sequence.len().saturating_sub(1) {
            return None;
        }
        let residue = monoisotopic(self.peptide.sequence[self.idx]);
        self.cumulative_mass += match self.kind {
            Kind::B => residue,
            Kind::Y => -residue,
        };
        self.idx += 1;

        Some(Ion {
            kind: self.kind,
            index: match self.kind {
                Kind::B => self.idx,
                Kind::Y => self.peptide.sequence.len() - self.idx,
            },
            monoisotopic_mass: self.cumulative_mass,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enzyme::Digest;
    use crate::mass::PROTON;
    use std::sync::Arc;

    fn peptide(s: &str) -> Peptide {
        Peptide::try_from(&Digest {
            sequence: s.into(),
            protein: Arc::from(""),
            missed_cleavages: 0,
            start_position: 1,
            end_position: s.len(),
        })
        .unwrap()
    }

    fn check_within<I: Iterator<Item = Ion>>(iter: I, expected_mz: &[f64]) {
        let observed = iter.map(|ion| ion.monoisotopic_mass).collect::<Vec<f64>>();
        assert_eq!(expected_mz.len(), observed.len());
        assert!(
            expected_mz
                .iter()
                .zip(observed.iter())
                .all(|(a, b)| (a - b).abs() < 0.001),
            "{:?} {:?}",
            expected_mz,
            observed
        );
    }

    macro_rules! ions {
        ($peptide:expr, $kind:expr, $charge:expr) => {{
            IonSeries::new($peptide, $kind).map(|mut ion| {
                ion.monoisotopic_mass = (ion.monoisotopic_mass + $charge * PROTON) / $charge;
                ion
            })
        }};
    }

    #[test]
    fn iterate_b_ions() {
        let peptide = peptide("PEPTIDE");

        let expected_mz = vec![
            98.06004, 227.10263, 324.15539, 425.20307, 538.28713, 653.31407,
        ];

        check_within(ions!(&peptide, Kind::B, 1.0), &expected_mz);
    }

    #[test]
    fn iterate_y_ions() {
        let peptide = peptide("PEPTIDE");

        // emitted from y_6 down to y_1
        let expected_mz = vec![
            703.31447, 574.27188, 477.21912, 376.17144, 263.08738, 148.06043,
        ];

        check_within(ions!(&peptide, Kind::Y, 1.0), &expected_mz);
    }

    #[test]
    fn doubly_charged_y_ions() {
        let peptide = peptide("PEPTIDE");

        let expected_mz = vec![
            352.16087, 287.63958, 239.11320, 188.58936, 132.04733, 74.53385,
        ];

        check_within(ions!(&peptide, Kind::Y, 2.0), &expected_mz);
    }

    #[test]
    fn indices() {
        let peptide = peptide("PEPTIDE");
        let b: Vec<usize> = IonSeries::new(&peptide, Kind::B).map(|i| i.index).collect();
        let y: Vec<usize> = IonSeries::new(&peptide, Kind::Y).map(|i| i.index).collect();
        assert_eq!(b, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(y, vec![6, 5, 4, 3, 2, 1]);
    }
}
