use std::str::FromStr;
use std::sync::OnceLock;

use log::warn;
use regex::Regex;
use serde::Serialize;

use crate::error::Error;
use crate::mass::{FUCOSE, HEXNAC, HEXOSE, NEUAC};

/// Structural classes of N-glycans. Classification rules are applied in
/// order and partition the composition space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum GlycanClass {
    HighMannose,
    Fucosylated,
    Sialylated,
    Sialofucosylated,
    ComplexHybrid,
}

impl GlycanClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlycanClass::HighMannose => "high-mannose",
            GlycanClass::Fucosylated => "fucosylated",
            GlycanClass::Sialylated => "sialylated",
            GlycanClass::Sialofucosylated => "sialofucosylated",
            GlycanClass::ComplexHybrid => "complex/hybrid",
        }
    }
}

/// An N-glycan composition of the form `H#N#F#A#`: hexose, HexNAc, fucose
/// and NeuAc counts. Missing species imply a count of zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Glycan {
    pub composition: String,
    pub hexose: u16,
    pub hexnac: u16,
    pub fucose: u16,
    pub neuac: u16,
    pub monoisotopic: f64,
    pub class: GlycanClass,
}

fn composition_grammar() -> &'static (Regex, Regex) {
    static GRAMMAR: OnceLock<(Regex, Regex)> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        (
            Regex::new(r"^([HNFA]\d+)+$").unwrap(),
            Regex::new(r"([HNFA])(\d+)").unwrap(),
        )
    })
}

impl FromStr for Glycan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let (shape, pairs) = composition_grammar();
        if !shape.is_match(s) {
            return Err(Error::InvalidComposition(s.into()));
        }

        let (mut hexose, mut hexnac, mut fucose, mut neuac) = (0u16, 0u16, 0u16, 0u16);
        for cap in pairs.captures_iter(s) {
            let count = cap[2]
                .parse::<u16>()
                .map_err(|_| Error::InvalidComposition(s.into()))?;
            match &cap[1] {
                "H" => hexose = count,
                "N" => hexnac = count,
                "F" => fucose = count,
                "A" => neuac = count,
                _ => unreachable!(),
            }
        }

        let monoisotopic = hexose as f64 * HEXOSE
            + hexnac as f64 * HEXNAC
            + fucose as f64 * FUCOSE
            + neuac as f64 * NEUAC;

        let class = classify(hexose, hexnac, fucose, neuac);

        Ok(Glycan {
            composition: s.into(),
            hexose,
            hexnac,
            fucose,
            neuac,
            monoisotopic,
            class,
        })
    }
}

fn classify(h: u16, n: u16, f: u16, a: u16) -> GlycanClass {
    if h >= 5 && n == 2 && f == 0 && a == 0 {
        GlycanClass::HighMannose
    } else if a > 0 && f > 0 {
        GlycanClass::Sialofucosylated
    } else if a > 0 {
        GlycanClass::Sialylated
    } else if f > 0 {
        GlycanClass::Fucosylated
    } else {
        GlycanClass::ComplexHybrid
    }
}

/// The built-in library of common N-glycan compositions
pub const DEFAULT_COMPOSITIONS: [&str; 63] = [
    // High-mannose
    "H3N2", "H4N2", "H5N2", "H6N2", "H7N2", "H8N2", "H9N2",
    // Complex, non-fucosylated, non-sialylated
    "H3N3", "H3N4", "H4N4", "H5N4", "H6N4", "H3N5", "H4N5", "H5N5", "H6N5",
    // Fucosylated
    "H3N3F1", "H3N4F1", "H4N4F1", "H5N4F1", "H6N4F1", "H3N5F1", "H4N5F1", "H5N5F1", "H6N5F1",
    "H3N4F2", "H4N4F2", "H5N4F2",
    // Sialylated
    "H3N3A1", "H3N4A1", "H4N4A1", "H5N4A1", "H6N4A1", "H3N4A2", "H4N4A2", "H5N4A2", "H6N4A2",
    "H3N5A2", "H4N5A2", "H5N5A2", "H6N5A2", "H4N5A3", "H5N5A3", "H6N5A3", "H5N6A3", "H6N6A3",
    // Sialofucosylated
    "H3N4F1A1", "H4N4F1A1", "H5N4F1A1", "H6N4F1A1", "H3N4F1A2", "H4N4F1A2", "H5N4F1A2",
    "H6N4F1A2", "H3N5F1A2", "H4N5F1A2", "H5N5F1A2", "H6N5F1A2", "H4N5F1A3", "H5N5F1A3",
    "H6N5F1A3", "H5N6F1A3", "H6N6F1A3",
];

pub fn default_library() -> Vec<Glycan> {
    DEFAULT_COMPOSITIONS
        .iter()
        .map(|c| c.parse().expect("built-in composition must parse"))
        .collect()
}

/// Parse a glycan library from text: one composition per line, `#` starts a
/// comment, blank lines are ignored. Unparseable lines are skipped with a
/// warning; the run continues as long as at least one composition parsed.
pub fn parse_library(contents: &str) -> Result<Vec<Glycan>, Error> {
    let mut glycans = Vec::new();
    for line in contents.lines() {
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<Glycan>() {
            Ok(glycan) => glycans.push(glycan),
            Err(e) => warn!("skipping glycan library line: {}", e),
        }
    }
    if glycans.is_empty() {
        return Err(Error::EmptyGlycanLibrary);
    }
    Ok(glycans)
}
