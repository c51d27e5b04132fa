//! Minimal MGF (Mascot generic format) reader.
//!
//! The search core consumes an iterator of spectrum records and never opens
//! mass spectrometry files itself; this module is the spectrum source the
//! CLI feeds it from. Centroided peak lists are expected.

use lectin_core::spectrum::RawSpectrum;

#[derive(thiserror::Error, Debug)]
pub enum MgfError {
    #[error("malformed MGF at line {line}: {reason}")]
    Malformed { line: usize, reason: &'static str },
}

pub struct MgfReader;

impl MgfReader {
    pub fn parse(contents: &str) -> Result<Vec<RawSpectrum>, MgfError> {
        let mut spectra = Vec::new();
        let mut current: Option<RawSpectrum> = None;

        for (idx, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with("BEGIN IONS") {
                if current.is_some() {
                    return Err(MgfError::Malformed {
                        line: idx + 1,
                        reason: "nested BEGIN IONS",
                    });
                }
                current = Some(RawSpectrum {
                    ms_level: 2,
                    ..Default::default()
                });
                continue;
            }

            if line.starts_with("END IONS") {
                let spectrum = current.take().ok_or(MgfError::Malformed {
                    line: idx + 1,
                    reason: "END IONS without BEGIN IONS",
                })?;
                if spectrum.mz.len() != spectrum.intensity.len() {
                    return Err(MgfError::Malformed {
                        line: idx + 1,
                        reason: "unbalanced peak arrays",
                    });
                }
                spectra.push(spectrum);
                continue;
            }

            let spectrum = match current.as_mut() {
                Some(s) => s,
                // header parameters outside BEGIN/END blocks are ignored
                None => continue,
            };

            if let Some(title) = line.strip_prefix("TITLE=") {
                spectrum.id = title.to_string();
            } else if let Some(pepmass) = line.strip_prefix("PEPMASS=") {
                let mz = pepmass
                    .split_ascii_whitespace()
                    .next()
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or(MgfError::Malformed {
                        line: idx + 1,
                        reason: "unparseable PEPMASS",
                    })?;
                spectrum.precursor_mz = Some(mz);
            } else if let Some(charge) = line.strip_prefix("CHARGE=") {
                spectrum.precursor_charge = parse_charge(charge);
            } else if let Some(rt) = line.strip_prefix("RTINSECONDS=") {
                spectrum.scan_start_time = rt.parse().unwrap_or_default();
            } else if line
                .chars()
                .next()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
            {
                let mut fields = line.split_ascii_whitespace();
                let mz = fields
                    .next()
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or(MgfError::Malformed {
                        line: idx + 1,
                        reason: "unparseable peak m/z",
                    })?;
                let intensity = fields
                    .next()
                    .and_then(|s| s.parse::<f64>().ok())
                    .unwrap_or(1.0);
                spectrum.mz.push(mz);
                spectrum.intensity.push(intensity);
            }
            // other KEY=VALUE parameters are ignored
        }

        if current.is_some() {
            return Err(MgfError::Malformed {
                line: contents.lines().count(),
                reason: "unterminated BEGIN IONS block",
            });
        }
        Ok(spectra)
    }
}

/// "2+", "3", or "2+ and 3+"; multiple charges leave the state unknown
fn parse_charge(field: &str) -> u8 {
    let charges: Vec<u8> = field
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    match charges.as_slice() {
        [single] => *single,
        _ => 0,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SPECTRUM: &str = r#"
BEGIN IONS
TITLE=scan=451
RTINSECONDS=873.2
PEPMASS=1223.527571 56700.5
CHARGE=2+
204.0867 1500.0
366.1396 800.0
512.1972
END IONS
"#;

    #[test]
    fn parse_one() {
        let spectra = MgfReader::parse(SPECTRUM).unwrap();
        assert_eq!(spectra.len(), 1);
        let s = &spectra[0];
        assert_eq!(s.id, "scan=451");
        assert_eq!(s.ms_level, 2);
        assert!((s.scan_start_time - 873.2).abs() < 1E-9);
        assert_eq!(s.precursor_mz, Some(1223.527571));
        assert_eq!(s.precursor_charge, 2);
        assert_eq!(s.mz.len(), 3);
        // missing intensity defaults to 1
        assert_eq!(s.intensity[2], 1.0);
    }

    #[test]
    fn multiple_charges_are_unknown() {
        let text = SPECTRUM.replace("CHARGE=2+", "CHARGE=2+ and 3+");
        let spectra = MgfReader::parse(&text).unwrap();
        assert_eq!(spectra[0].precursor_charge, 0);
    }

    #[test]
    fn unterminated_block() {
        assert!(matches!(
            MgfReader::parse("BEGIN IONS\nTITLE=x\n100.0 1.0\n"),
            Err(MgfError::Malformed { .. })
        ));
    }

    #[test]
    fn two_spectra() {
        let mut text = String::from(SPECTRUM);
        text.push_str(&SPECTRUM.replace("scan=451", "scan=452"));
        let spectra = MgfReader::parse(&text).unwrap();
        assert_eq!(spectra.len(), 2);
        assert_eq!(spectra[1].id, "scan=452");
    }
}
