use anyhow::Context;
use clap::{value_parser, Arg, Command, ValueHint};
use input::{Input, Search};
use lectin_core::database::SearchDatabases;
use lectin_core::fasta::Fasta;
use lectin_core::glycan;
use lectin_core::search::{SearchResults, Searcher};
use lectin_core::spectrum::{RawSpectrum, SpectrumProcessor};
use lectin_core::theoretical::TheoreticalBuilder;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

mod input;
mod mgf;
mod output;

pub struct Runner {
    databases: SearchDatabases,
    parameters: Search,
    start: Instant,
}

impl Runner {
    pub fn new(parameters: Search) -> anyhow::Result<Self> {
        let start = Instant::now();

        let contents = std::fs::read_to_string(&parameters.fasta)
            .with_context(|| format!("failed to read fasta `{}`", parameters.fasta))?;
        let fasta = Fasta::parse(&contents);

        let glycans = match &parameters.glycans {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read glycan library `{}`", path))?;
                glycan::parse_library(&contents)?
            }
            None => glycan::default_library(),
        };
        info!("loaded {} glycan compositions", glycans.len());

        let databases = parameters
            .database
            .build(&fasta, glycans)
            .context("failed to build the candidate index")?;
        info!(
            "built target index with {} candidates in {}ms",
            databases.target.candidates.len(),
            start.elapsed().as_millis()
        );

        Ok(Self {
            databases,
            parameters,
            start,
        })
    }

    fn make_path<S: AsRef<str>>(&self, file_name: S) -> PathBuf {
        self.parameters.output_directory.join(file_name.as_ref())
    }

    fn read_spectra(&self) -> anyhow::Result<Vec<RawSpectrum>> {
        let start = Instant::now();
        let mut spectra = Vec::new();
        for path in &self.parameters.mgf_paths {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read `{}`", path))?;
            let parsed = mgf::MgfReader::parse(&contents)
                .with_context(|| format!("failed to parse `{}`", path))?;
            log::trace!("- {}: read {} spectra", path, parsed.len());
            spectra.extend(parsed);
        }
        info!("- file IO: {:8} ms", start.elapsed().as_millis());
        Ok(spectra)
    }

    pub fn run(mut self) -> anyhow::Result<()> {
        let spectra = self.read_spectra()?;

        let processor = SpectrumProcessor::new(
            self.parameters.bin_width,
            self.parameters.max_mz,
            self.parameters.regions,
        );
        let builder = TheoreticalBuilder::new(processor.grid, self.parameters.max_charge);
        let searcher = Searcher::new(
            &self.databases,
            processor,
            builder,
            self.parameters.tolerance_ppm,
            self.parameters.sp_top_k,
            self.parameters.report_psms,
            self.parameters.fdr_threshold,
            self.parameters.decoy_factor,
        );

        let SearchResults { psms, summary } = searcher.run(&spectra)?;

        info!(
            "searched {} of {} spectra, {} skipped",
            summary.searched,
            summary.total_spectra,
            summary.skipped.len()
        );
        info!(
            "discovered {} target PSMs ({} passing q <= {})",
            summary.target_psms, summary.passing_psms, self.parameters.fdr_threshold
        );

        let psm_path = self.write_psms(&psms)?;
        self.parameters.output_paths.push(psm_path);

        let summary_path = self.make_path("summary.json");
        std::fs::write(&summary_path, serde_json::to_vec_pretty(&summary)?)?;
        self.parameters
            .output_paths
            .push(summary_path.to_string_lossy().into_owned());

        let results_path = self.make_path("results.json");
        self.parameters
            .output_paths
            .push(results_path.to_string_lossy().into_owned());
        std::fs::write(&results_path, serde_json::to_vec_pretty(&self.parameters)?)?;

        info!("finished in {}s", self.start.elapsed().as_secs());
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("LECTIN_LOG", "error,lectin=info"))
        .init();

    let matches = Command::new("lectin")
        .version(clap::crate_version!())
        .about("Intact N-glycopeptide identification from tandem mass spectra")
        .arg(
            Arg::new("parameters")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to configuration parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("mgf_paths")
                .num_args(1..)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Paths to MGF files to process. Overrides files listed in the \
                     configuration file.",
                )
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("fasta")
                .short('f')
                .long("fasta")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to FASTA database, overriding the configuration file")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("glycans")
                .short('g')
                .long("glycans")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to a glycan composition list, replacing the built-in library")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("output_directory")
                .short('o')
                .long("output_directory")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Directory where search results will be written")
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_parser(value_parser!(usize))
                .help("Worker pool size (default = # of physical cores)")
                .value_hint(ValueHint::Other),
        )
        .get_matches();

    let input = Input::from_arguments(&matches)?;
    let search = input.build()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(search.workers)
        .build_global()
        .context("failed to size the worker pool")?;

    let runner = Runner::new(search)?;
    runner.run()?;

    Ok(())
}
