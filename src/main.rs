use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tomocov::io::{read_sensitivity_file, read_unknown_parameters};
use tomocov::{CovarianceConfig, ModelCovariance};

#[derive(Parser)]
#[command(
    name = "tomocov",
    version,
    about = "Build and factor the a-priori model covariance for a tomographic inversion"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build C and its Cholesky factor for a parameter file and report their size
    Summary {
        /// Unknown parameter file (TYPE lat lon radius weighting per line)
        parameters: PathBuf,

        /// Covariance configuration in TOML format
        #[arg(long)]
        config: Option<PathBuf>,

        /// Sensitivity file, in the same order as the parameter file
        #[arg(long)]
        sensitivity: Option<PathBuf>,

        /// Override the horizontal correlation length (degrees)
        #[arg(long, value_name = "DEG")]
        horizontal: Option<f64>,

        /// Override the vertical correlation length (km)
        #[arg(long, value_name = "KM")]
        vertical: Option<f64>,
    },
    /// Write the default configuration
    #[command(about = "Write a default configuration (outputs: covariance.toml)")]
    DefaultConfig {
        #[arg(long, default_value = "covariance.toml")]
        output: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Summary {
            parameters,
            config,
            sensitivity,
            horizontal,
            vertical,
        } => summary_command(
            &parameters,
            config.as_deref(),
            sensitivity.as_deref(),
            horizontal,
            vertical,
        ),
        Commands::DefaultConfig { output } => default_config_command(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn summary_command(
    parameters_path: &Path,
    config_path: Option<&Path>,
    sensitivity_path: Option<&Path>,
    horizontal: Option<f64>,
    vertical: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => {
            println!("Loading configuration from: {}", path.display());
            CovarianceConfig::load(path)?
        }
        None => CovarianceConfig::default(),
    };
    if let Some(h) = horizontal {
        config.correlation.horizontal_deg = h;
    }
    if let Some(v) = vertical {
        config.correlation.vertical_km = v;
    }

    let parameters = read_unknown_parameters(parameters_path)?;
    if sensitivity_path.is_some() && !config.weights.needs_sensitivities() {
        log::warn!(
            "The {} weighting policy does not use sensitivities; the sensitivity file is read but not used.",
            config.weights.name()
        );
    }
    let sensitivities = match sensitivity_path {
        Some(path) => Some(read_sensitivity_file(path)?),
        None => None,
    };

    println!(
        "Using {} weights, h = {} deg, v = {} km",
        config.weights.name(),
        config.correlation.horizontal_deg,
        config.correlation.vertical_km
    );
    let covariance = ModelCovariance::from_config(&parameters, &config, sensitivities.as_deref())?;
    println!("{}", covariance.summary());
    Ok(())
}

fn default_config_command(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    CovarianceConfig::default().save(output)?;
    println!("Configuration saved to: {}", output.display());
    Ok(())
}
