use serde::Serialize;

use crate::glycan::Glycan;
use crate::ion_series::{IonSeries, Kind};
use crate::mass::PROTON;
use crate::peptide::Peptide;
use crate::spectrum::BinGrid;

/// Relative intensities by ion family
pub const BACKBONE_INTENSITY: f64 = 1.0;
pub const STUB_INTENSITY: f64 = 0.5;
pub const OXONIUM_INTENSITY: f64 = 0.8;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PeakKind {
    B,
    Y,
    /// y ion carrying the intact glycan
    YGlycan,
    Oxonium,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct TheoreticalPeak {
    pub mz: f64,
    /// Relative intensity in (0, 1]
    pub intensity: f64,
    pub kind: PeakKind,
    /// Fragment index for backbone ions, 0 otherwise
    pub index: usize,
    pub charge: u8,
}

/// Diagnostic oxonium ions: fixed singly-charged m/z, emitted only when the
/// glycan composition contains the constituent monosaccharides
const OXONIUM_HEXNAC: f64 = 204.0867;
const OXONIUM_HEXNAC_HEX: f64 = 366.1396;
const OXONIUM_HEX: f64 = 163.0601;
const OXONIUM_FUC: f64 = 147.0652;
const OXONIUM_NEUAC: f64 = 292.1027;
const OXONIUM_HEXNAC_HEX_FUC: f64 = 512.1972;
const OXONIUM_HEXNAC_HEX_NEUAC: f64 = 657.2350;

/// Builds theoretical glycopeptide spectra on the shared bin grid
#[derive(Copy, Clone, Debug)]
pub struct TheoreticalBuilder {
    pub grid: BinGrid,
    /// Maximum backbone fragment charge
    pub max_charge: u8,
}

impl TheoreticalBuilder {
    pub fn new(grid: BinGrid, max_charge: u8) -> Self {
        Self { grid, max_charge }
    }

    /// Enumerate every theoretical peak for a candidate: b/y backbone ions
    /// at each charge, the glycan-stub companion of every y ion, and the
    /// diagnostic oxonium ions consistent with the glycan composition.
    pub fn peaks(&self, peptide: &Peptide, glycan: &Glycan) -> Vec<TheoreticalPeak> {
        let mut peaks = Vec::new();
        let g = glycan.monoisotopic;

        for charge in 1..=self.max_charge {
            let z = charge as f64;
            for ion in IonSeries::new(peptide, Kind::B).chain(IonSeries::new(peptide, Kind::Y)) {
                let mz = (ion.monoisotopic_mass + z * PROTON) / z;
                peaks.push(TheoreticalPeak {
                    mz,
                    intensity: BACKBONE_INTENSITY,
                    kind: match ion.kind {
                        Kind::B => PeakKind::B,
                        Kind::Y => PeakKind::Y,
                    },
                    index: ion.index,
                    charge,
                });
                // the glycan stays attached to the C-terminal fragment
                if ion.kind == Kind::Y {
                    peaks.push(TheoreticalPeak {
                        mz: mz + g / z,
                        intensity: STUB_INTENSITY,
                        kind: PeakKind::YGlycan,
                        index: ion.index,
                        charge,
                    });
                }
            }
        }

        self.oxonium_ions(glycan, &mut peaks);
        peaks
    }

    fn oxonium_ions(&self, glycan: &Glycan, peaks: &mut Vec<TheoreticalPeak>) {
        let mut oxonium = |mz| {
            peaks.push(TheoreticalPeak {
                mz,
                intensity: OXONIUM_INTENSITY,
                kind: PeakKind::Oxonium,
                index: 0,
                charge: 1,
            })
        };

        if glycan.hexnac > 0 {
            oxonium(OXONIUM_HEXNAC);
        }
        if glycan.hexose > 0 {
            oxonium(OXONIUM_HEX);
        }
        if glycan.fucose > 0 {
            oxonium(OXONIUM_FUC);
        }
        if glycan.neuac > 0 {
            oxonium(OXONIUM_NEUAC);
        }
        if glycan.hexnac > 0 && glycan.hexose > 0 {
            oxonium(OXONIUM_HEXNAC_HEX);
        }
        if glycan.hexnac > 0 && glycan.hexose > 0 && glycan.fucose > 0 {
            oxonium(OXONIUM_HEXNAC_HEX_FUC);
        }
        if glycan.hexnac > 0 && glycan.hexose > 0 && glycan.neuac > 0 {
            oxonium(OXONIUM_HEXNAC_HEX_NEUAC);
        }
    }

    /// Vectorize the theoretical peak set onto the bin grid, taking the
    /// maximum intensity within each bin. Peaks off the grid are dropped.
    pub fn vector(&self, peptide: &Peptide, glycan: &Glycan) -> Vec<f64> {
        let mut binned = vec![0.0; self.grid.bins];
        for peak in self.peaks(peptide, glycan) {
            if let Some(bin) = self.grid.bin(peak.mz) {
                binned[bin] = f64::max(binned[bin], peak.intensity);
            }
        }
        binned
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enzyme::Digest;
    use crate::mass::H2O;
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

    fn builder() -> TheoreticalBuilder {
        TheoreticalBuilder::new(BinGrid::new(1.000508, 2000.0), 2)
    }

    #[test]
    fn backbone_and_stub_counts() {
        let p = peptide("NGTDEK");
        let g: Glycan = "H5N2".parse().unwrap();
        let peaks = builder().peaks(&p, &g);

        let count = |kind: PeakKind| peaks.iter().filter(|p| p.kind == kind).count();
        // L-1 = 5 fragments per series per charge state
        assert_eq!(count(PeakKind::B), 10);
        assert_eq!(count(PeakKind::Y), 10);
        // one stub per y ion
        assert_eq!(count(PeakKind::YGlycan), 10);
        // H5N2: HexNAc, Hex, HexNAc-Hex
        assert_eq!(count(PeakKind::Oxonium), 3);
    }

    #[test]
    fn stub_rides_on_y_ion() {
        let p = peptide("NGTDEK");
        let g: Glycan = "H5N2".parse().unwrap();
        let peaks = builder().peaks(&p, &g);

        for stub in peaks.iter().filter(|p| p.kind == PeakKind::YGlycan) {
            let y = peaks
                .iter()
                .find(|p| p.kind == PeakKind::Y && p.index == stub.index && p.charge == stub.charge)
                .unwrap();
            let z = stub.charge as f64;
            assert!((stub.mz - (y.mz + g.monoisotopic / z)).abs() < 1E-9);
            assert!((stub.intensity - STUB_INTENSITY).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn y1_mass() {
        let p = peptide("NGTDEK");
        let g: Glycan = "H5N2".parse().unwrap();
        let peaks = builder().peaks(&p, &g);
        let y1 = peaks
            .iter()
            .find(|p| p.kind == PeakKind::Y && p.index == 1 && p.charge == 1)
            .unwrap();
        // y1 = K + H2O + proton
        assert!((y1.mz - (128.09496 + H2O + PROTON)).abs() < 1E-9);
    }

    #[test]
    fn oxonium_gating() {
        let p = peptide("NGTDEK");
        let mz_of = |g: &str| -> Vec<f64> {
            let g: Glycan = g.parse().unwrap();
            builder()
                .peaks(&p, &g)
                .into_iter()
                .filter(|p| p.kind == PeakKind::Oxonium)
                .map(|p| p.mz)
                .collect()
        };

        // no NeuAc ions without A, no fucose ions without F
        let hm = mz_of("H5N2");
        assert!(hm.contains(&OXONIUM_HEXNAC));
        assert!(hm.contains(&OXONIUM_HEX));
        assert!(hm.contains(&OXONIUM_HEXNAC_HEX));
        assert!(!hm.contains(&OXONIUM_NEUAC));
        assert!(!hm.contains(&OXONIUM_FUC));

        let sf = mz_of("H5N4F1A2");
        for mz in [
            OXONIUM_HEXNAC,
            OXONIUM_HEX,
            OXONIUM_FUC,
            OXONIUM_NEUAC,
            OXONIUM_HEXNAC_HEX,
            OXONIUM_HEXNAC_HEX_FUC,
            OXONIUM_HEXNAC_HEX_NEUAC,
        ] {
            assert!(sf.contains(&mz));
        }
    }

    #[test]
    fn vector_takes_max_within_bin() {
        let p = peptide("NGTDEK");
        let g: Glycan = "H5N2".parse().unwrap();
        let b = builder();
        let v = b.vector(&p, &g);
        assert_eq!(v.len(), 1999);
        // every non-zero bin holds one of the three intensity levels, and
        // bins shared between families hold the maximum
        for &x in v.iter().filter(|&&x| x > 0.0) {
            assert!(
                (x - BACKBONE_INTENSITY).abs() < 1E-12
                    || (x - STUB_INTENSITY).abs() < 1E-12
                    || (x - OXONIUM_INTENSITY).abs() < 1E-12
            );
        }
        let oxonium_bin = b.grid.bin(OXONIUM_HEXNAC).unwrap();
        assert!((v[oxonium_bin] - OXONIUM_INTENSITY).abs() < 1E-12);
    }

    #[test]
    fn peaks_beyond_grid_are_dropped() {
        // large glycan pushes stubs past 2000 m/z at charge 1
        let p = peptide("NGTDEK");
        let g: Glycan = "H9N2".parse().unwrap();
        let b = builder();
        let peaks = b.peaks(&p, &g);
        let v = b.vector(&p, &g);
        assert!(peaks.iter().any(|p| p.mz > b.grid.max_mz));
        let nonzero = v.iter().filter(|&&x| x > 0.0).count();
        let in_range: fnv::FnvHashSet<usize> = peaks
            .iter()
            .filter_map(|p| b.grid.bin(p.mz))
            .collect();
        assert_eq!(nonzero, in_range.len());
    }
}
