use clap::ArgMatches;
use lectin_core::database::{Builder, Parameters};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize)]
/// Actual search parameters - may include overrides or default values not
/// set by the user
pub struct Search {
    pub database: Parameters,
    /// Precursor mass window half-width, ppm
    pub tolerance_ppm: f64,
    /// Candidates retained after preliminary scoring
    pub sp_top_k: usize,
    /// Maximum fragment charge
    pub max_charge: u8,
    /// Preprocessing bin width, Da
    pub bin_width: f64,
    /// Upper bound of the bin grid
    pub max_mz: f64,
    /// Number of normalization windows
    pub regions: usize,
    /// q-value cutoff
    pub fdr_threshold: f64,
    /// Multiplier on the decoy count in the FDR estimate
    pub decoy_factor: f64,
    /// PSMs reported per spectrum
    pub report_psms: usize,
    /// Worker pool size; defaults to the physical core count
    pub workers: usize,
    pub fasta: String,
    /// Glycan library file; the built-in library when absent
    pub glycans: Option<String>,
    pub mgf_paths: Vec<String>,
    pub output_paths: Vec<String>,

    #[serde(skip_serializing)]
    pub output_directory: PathBuf,
}

#[derive(Deserialize)]
/// Input search parameters deserialized from a JSON file
pub struct Input {
    database: Option<Builder>,
    tolerance_ppm: Option<f64>,
    sp_top_k: Option<usize>,
    max_charge: Option<u8>,
    bin_width: Option<f64>,
    max_mz: Option<f64>,
    regions: Option<usize>,
    fdr_threshold: Option<f64>,
    decoy_factor: Option<f64>,
    report_psms: Option<usize>,
    workers: Option<usize>,
    fasta: Option<String>,
    glycans: Option<String>,
    mgf_paths: Option<Vec<String>>,
    output_directory: Option<String>,
}

impl Input {
    pub fn from_arguments(matches: &ArgMatches) -> anyhow::Result<Self> {
        let path = matches
            .get_one::<String>("parameters")
            .expect("required parameters");
        let mut input: Input = lectin_core::read_json(path)?;

        // Command line arguments override the configuration file
        if let Some(fasta) = matches.get_one::<String>("fasta") {
            input.fasta = Some(fasta.clone());
        }
        if let Some(glycans) = matches.get_one::<String>("glycans") {
            input.glycans = Some(glycans.clone());
        }
        if let Some(output_directory) = matches.get_one::<String>("output_directory") {
            input.output_directory = Some(output_directory.clone());
        }
        if let Some(mgf_paths) = matches.get_many::<String>("mgf_paths") {
            input.mgf_paths = Some(mgf_paths.cloned().collect());
        }
        if let Some(workers) = matches.get_one::<usize>("workers") {
            input.workers = Some(*workers);
        }

        Ok(input)
    }

    pub fn build(self) -> anyhow::Result<Search> {
        let database = self.database.unwrap_or_default().make_parameters();

        let tolerance_ppm = self.tolerance_ppm.unwrap_or(10.0);
        if tolerance_ppm <= 0.0 {
            anyhow::bail!("tolerance_ppm must be positive");
        }
        let fdr_threshold = self.fdr_threshold.unwrap_or(0.01);
        if !(0.0..=1.0).contains(&fdr_threshold) {
            anyhow::bail!("fdr_threshold must lie in [0, 1]");
        }
        let decoy_factor = self.decoy_factor.unwrap_or(2.0);
        if decoy_factor <= 0.0 {
            anyhow::bail!("decoy_factor must be positive");
        }
        let bin_width = self.bin_width.unwrap_or(1.000508);
        let max_mz = self.max_mz.unwrap_or(2000.0);
        if bin_width <= 0.0 || max_mz <= bin_width {
            anyhow::bail!("bin grid is degenerate: width {} max {}", bin_width, max_mz);
        }

        let fasta = self
            .fasta
            .ok_or_else(|| anyhow::anyhow!("'fasta' must be provided"))?;
        let mgf_paths = self
            .mgf_paths
            .ok_or_else(|| anyhow::anyhow!("'mgf_paths' must be provided"))?;

        let output_directory = match self.output_directory {
            Some(path) => {
                let path = PathBuf::from(path);
                std::fs::create_dir_all(&path)?;
                path
            }
            None => std::env::current_dir()?,
        };

        Ok(Search {
            database,
            tolerance_ppm,
            sp_top_k: self.sp_top_k.unwrap_or(500),
            max_charge: self.max_charge.unwrap_or(2).max(1),
            bin_width,
            max_mz,
            regions: self.regions.unwrap_or(10).max(1),
            fdr_threshold,
            decoy_factor,
            report_psms: self.report_psms.unwrap_or(1).max(1),
            workers: self.workers.unwrap_or_else(num_cpus::get_physical),
            fasta,
            glycans: self.glycans,
            mgf_paths,
            output_paths: Vec::new(),
            output_directory,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn minimal() -> Input {
        serde_json::from_str(
            r#"{
                "fasta": "proteins.fasta",
                "mgf_paths": ["run1.mgf"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_match_documentation() {
        let search = minimal().build().unwrap();
        assert_eq!(search.database.enzyme, "trypsin");
        assert_eq!(search.database.missed_cleavages, 2);
        assert_eq!(search.database.min_peptide_len, 6);
        assert_eq!(search.database.max_peptide_len, 40);
        assert_eq!(search.tolerance_ppm, 10.0);
        assert_eq!(search.sp_top_k, 500);
        assert_eq!(search.max_charge, 2);
        assert_eq!(search.bin_width, 1.000508);
        assert_eq!(search.max_mz, 2000.0);
        assert_eq!(search.regions, 10);
        assert_eq!(search.fdr_threshold, 0.01);
        assert_eq!(search.decoy_factor, 2.0);
        assert!(search.workers >= 1);
    }

    #[test]
    fn missing_fasta_is_rejected() {
        let input: Input = serde_json::from_str(r#"{ "mgf_paths": ["run1.mgf"] }"#).unwrap();
        assert!(input.build().is_err());
    }

    #[test]
    fn bad_tolerance_is_rejected() {
        let mut input = minimal();
        input.tolerance_ppm = Some(-5.0);
        assert!(input.build().is_err());
    }
}
