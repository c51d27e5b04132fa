/// Errors surfaced by the search engine.
///
/// Per-input failures (`InvalidSequence`, `InvalidComposition`,
/// `MalformedSpectrum`) are recovered close to where they occur and rolled
/// into the run summary; the remaining variants are fatal.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid residue '{residue}' at position {position} of protein {protein}")]
    InvalidSequence {
        protein: String,
        residue: char,
        position: usize,
    },
    #[error("unrecognized enzyme: {0}")]
    UnknownEnzyme(String),
    #[error("invalid glycan composition: {0}")]
    InvalidComposition(String),
    #[error("malformed spectrum {id}: {reason}")]
    MalformedSpectrum { id: String, reason: &'static str },
    #[error("no glycan compositions could be parsed from the library")]
    EmptyGlycanLibrary,
    #[error("candidate index is empty - no sequon-bearing peptides or no glycans")]
    EmptyIndex,
    #[error("cross-correlation produced a non-finite value")]
    Numerical,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
