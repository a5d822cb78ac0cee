#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the clinic saturation analysis.
//!
//! Runs one analysis against the live population and clinic registries and
//! prints the saturation tables, or lists the code tables the analysis is
//! keyed on. Without a subcommand it falls back to an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`clinic_map_cli_utils::init_logger`])
//! so log lines and the per-area progress bars share the terminal.

mod analysis;
mod interactive;
mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clinic_map_analytics_models::SupplyMeasure;
use clinic_map_geography_models::Granularity;
use clinic_map_merge::AnalysisRequest;
use clinic_map_source_models::{Demographic, YearMonth};

#[derive(Parser)]
#[command(name = "clinic_map", about = "Clinic saturation analysis")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute saturation tables for a scope
    Analyze(AnalyzeArgs),
    /// Print the boundary code to match key mapping for a scope
    DissolveKeys {
        /// Granularity of the keys
        #[arg(long, default_value = "national")]
        granularity: Granularity,
        /// Province name or code in either registry (province granularity),
        /// or city code (city granularity)
        #[arg(long)]
        scope: Option<String>,
        /// Neighborhood boundary `GeoJSON` file
        #[arg(long)]
        boundaries: PathBuf,
    },
    /// List specialty codes
    Specialties,
    /// List province codes in both registries
    Provinces,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Granularity of the result areas
    #[arg(long, default_value = "national")]
    granularity: Granularity,
    /// Province name or code in either registry (province granularity), or
    /// city code (city granularity)
    #[arg(long)]
    scope: Option<String>,
    /// Population period as `YYYYMM`. Defaults to last month.
    #[arg(long)]
    period: Option<YearMonth>,
    /// Comma-separated specialty codes (default: 01,05,11,12,14)
    #[arg(long, value_delimiter = ',')]
    specialties: Vec<String>,
    /// Comma-separated facility class codes (default: 31,21,11)
    #[arg(long, value_delimiter = ',')]
    classes: Vec<String>,
    /// Demand column
    #[arg(long, default_value = "total-population")]
    demographic: Demographic,
    /// Supply column
    #[arg(long, default_value = "clinic-count")]
    supply: SupplyMeasure,
    /// Neighborhood boundary `GeoJSON` file
    #[arg(long)]
    boundaries: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl AnalyzeArgs {
    fn request(&self) -> Result<AnalysisRequest, Box<dyn std::error::Error>> {
        let period = match self.period {
            Some(period) => period,
            None => analysis::default_period()?,
        };
        let mut request = AnalysisRequest::new(self.granularity, self.scope.clone(), period);
        if !self.specialties.is_empty() {
            request.specialty_codes.clone_from(&self.specialties);
        }
        if !self.classes.is_empty() {
            request.facility_classes.clone_from(&self.classes);
        }
        request.demographic = self.demographic;
        request.supply = self.supply;
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = clinic_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Analyze(args) => {
            let request = args.request()?;
            let merger = analysis::merger(&args.boundaries, &multi)?;
            let bundle = merger.run(&request).await?;
            match args.format {
                OutputFormat::Table => {
                    output::print_bundle(&bundle, request.demographic, request.supply);
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&bundle)?),
            }
        }
        Commands::DissolveKeys {
            granularity,
            scope,
            boundaries,
        } => {
            let merger = analysis::merger(&boundaries, &multi)?;
            let keys = merger.dissolve_keys(granularity, scope.as_deref()).await?;
            output::print_dissolve_keys(&keys);
        }
        Commands::Specialties => output::print_specialties(),
        Commands::Provinces => output::print_provinces(),
    }

    Ok(())
}
