use serde::Serialize;

use crate::error::Error;

/// Width of the window around the precursor m/z that is removed before
/// binning, in Da
pub const PRECURSOR_WINDOW: f64 = 15.0;

/// An unprocessed MS/MS spectrum, as returned by a parser.
/// Fragment arrays are parallel and m/z is non-decreasing.
#[derive(Default, Debug, Clone)]
pub struct RawSpectrum {
    /// Scan identifier
    pub id: String,
    /// MSn level
    pub ms_level: u8,
    /// Retention time in seconds
    pub scan_start_time: f64,
    /// Selected precursor m/z, if any
    pub precursor_mz: Option<f64>,
    /// Precursor charge; 0 when unknown
    pub precursor_charge: u8,
    /// Fragment m/z array
    pub mz: Vec<f64>,
    /// Fragment intensity array
    pub intensity: Vec<f64>,
}

impl RawSpectrum {
    /// Check the structural invariants: parallel arrays of equal length,
    /// finite non-negative values, non-decreasing m/z, charge within 0..=8
    pub fn validate(&self) -> Result<(), Error> {
        let malformed = |reason| Error::MalformedSpectrum {
            id: self.id.clone(),
            reason,
        };
        if self.mz.len() != self.intensity.len() {
            return Err(malformed("mz and intensity arrays differ in length"));
        }
        if self
            .mz
            .iter()
            .chain(self.intensity.iter())
            .any(|x| !x.is_finite() || *x < 0.0)
        {
            return Err(malformed("non-finite or negative peak values"));
        }
        if self.mz.windows(2).any(|w| w[0] > w[1]) {
            return Err(malformed("mz array is not sorted"));
        }
        if self.precursor_charge > 8 {
            return Err(malformed("precursor charge out of range"));
        }
        Ok(())
    }
}

/// The shared m/z bin grid used for both observed and theoretical vectors.
/// Bin index of m/z `x` is `floor(x / width)`, clipped to the grid.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct BinGrid {
    pub width: f64,
    pub max_mz: f64,
    pub bins: usize,
}

impl BinGrid {
    pub fn new(width: f64, max_mz: f64) -> Self {
        Self {
            width,
            max_mz,
            bins: (max_mz / width).ceil() as usize,
        }
    }

    /// Bin index for an m/z inside [0, max_mz]; `None` outside
    pub fn bin(&self, mz: f64) -> Option<usize> {
        if !(0.0..=self.max_mz).contains(&mz) {
            return None;
        }
        Some(((mz / self.width) as usize).min(self.bins - 1))
    }
}

/// A spectrum reduced to a fixed-length intensity vector on the bin grid
#[derive(Clone, Debug)]
pub struct ProcessedSpectrum {
    pub id: String,
    pub scan_start_time: f64,
    pub precursor_mz: Option<f64>,
    pub precursor_charge: u8,
    /// Binned, square-rooted, regionally normalized intensities
    pub intensities: Vec<f64>,
    /// Number of peaks surviving the filters
    pub peaks_kept: usize,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct SpectrumProcessor {
    pub grid: BinGrid,
    /// Number of normalization windows
    pub regions: usize,
}

impl SpectrumProcessor {
    pub fn new(bin_width: f64, max_mz: f64, regions: usize) -> Self {
        Self {
            grid: BinGrid::new(bin_width, max_mz),
            regions,
        }
    }

    /// Produce the preprocessed intensity vector:
    /// 1. drop peaks with nonpositive intensity or m/z off the grid
    /// 2. drop peaks within the precursor window
    /// 3. accumulate intensities into bins
    /// 4. square-root each bin
    /// 5. scale each of `regions` windows so its maximum is 50
    ///
    /// A spectrum whose peaks are all filtered out yields the all-zero
    /// vector; the caller decides whether to skip scoring.
    pub fn process(&self, spectrum: &RawSpectrum) -> Result<ProcessedSpectrum, Error> {
        spectrum.validate()?;

        let mut intensities = vec![0.0; self.grid.bins];
        let mut peaks_kept = 0;

        for (&mz, &intensity) in spectrum.mz.iter().zip(spectrum.intensity.iter()) {
            if intensity <= 0.0 {
                continue;
            }
            if let Some(precursor) = spectrum.precursor_mz {
                if (mz - precursor).abs() <= PRECURSOR_WINDOW {
                    continue;
                }
            }
            if let Some(bin) = self.grid.bin(mz) {
                intensities[bin] += intensity;
                peaks_kept += 1;
            }
        }

        for x in intensities.iter_mut() {
            *x = x.sqrt();
        }

        self.normalize_regions(&mut intensities);

        Ok(ProcessedSpectrum {
            id: spectrum.id.clone(),
            scan_start_time: spectrum.scan_start_time,
            precursor_mz: spectrum.precursor_mz,
            precursor_charge: spectrum.precursor_charge,
            intensities,
            peaks_kept,
        })
    }

    /// Scale each region so its maximum intensity becomes 50; empty regions
    /// stay zero. The final region absorbs the remainder bins.
    fn normalize_regions(&self, intensities: &mut [f64]) {
        let region_size = intensities.len() / self.regions;
        for r in 0..self.regions {
            let start = r * region_size;
            let end = match r + 1 == self.regions {
                true => intensities.len(),
                false => start + region_size,
            };
            let max = intensities[start..end].iter().cloned().fold(0.0, f64::max);
            if max > 0.0 {
                let scale = 50.0 / max;
                for x in intensities[start..end].iter_mut() {
                    *x *= scale;
                }
            }
        }
    }
}
