pub mod database;
pub mod enzyme;
pub mod error;
pub mod fasta;
pub mod fdr;
pub mod glycan;
pub mod ion_series;
pub mod mass;
pub mod peptide;
pub mod scoring;
pub mod search;
pub mod spectrum;
pub mod theoretical;
pub mod xcorr;

pub use error::Error;

/// Deserialize a JSON file into `T`
pub fn read_json<T, P>(path: P) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<std::path::Path>,
{
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
