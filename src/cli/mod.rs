//! Command-line parsing for the `c14` radiocarbon calibration tool.
//!
//! Argument parsing and command dispatch stay separate from the calibration
//! code; handlers live in [`crate::app`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::curve::CurveName;
use crate::domain::StorageMode;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "c14", version, about = "Radiocarbon calibration and uncalibration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calibrate radiocarbon dates and print medians and HPD intervals.
    Calibrate(CalibrateArgs),
    /// Uncalibrate calendar ages (or a calendar density) into radiocarbon ages.
    Uncalibrate(UncalibrateArgs),
    /// Blend a terrestrial and a marine curve into a mixed curve.
    Mix(MixArgs),
}

/// Where calibration curves come from.
#[derive(Debug, Args, Clone)]
pub struct CurveArgs {
    /// Built-in curve name.
    #[arg(long, value_enum, default_value_t = CurveName::Intcal20)]
    pub curve: CurveName,

    /// Custom three-column curve CSV (cal BP, 14C BP, error). Overrides `--curve`.
    #[arg(long = "curve-file", value_name = "CSV")]
    pub curve_file: Option<PathBuf>,

    /// Directory holding `<name>.14c` files (defaults to $C14_CURVE_DIR or ./curves).
    #[arg(long = "curve-dir", value_name = "DIR")]
    pub curve_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CalibrateArgs {
    /// CSV with `age` and `error` columns (plus optional id, details, curve, offsets).
    #[arg(short = 'i', long, value_name = "CSV", conflicts_with = "age")]
    pub input: Option<PathBuf>,

    /// Calibrate a single radiocarbon age instead of a CSV.
    #[arg(long, requires = "error")]
    pub age: Option<f64>,

    /// Measurement error of `--age`.
    #[arg(long)]
    pub error: Option<f64>,

    /// Identifier for `--age`.
    #[arg(long)]
    pub id: Option<String>,

    #[command(flatten)]
    pub curves: CurveArgs,

    /// Oldest calendar age (BP) of the calibration window.
    #[arg(long, default_value_t = 50_000)]
    pub start_bp: i64,

    /// Youngest calendar age (BP) of the calibration window.
    #[arg(long, default_value_t = 0)]
    pub end_bp: i64,

    /// Keep raw likelihoods instead of normalising each date to unit mass.
    #[arg(long)]
    pub no_normalise: bool,

    /// Compute likelihoods on the F14C scale.
    #[arg(long)]
    pub f14c: bool,

    /// Densities below this value are set to zero.
    #[arg(long, default_value_t = crate::calibrate::DEFAULT_EPS)]
    pub eps: f64,

    #[arg(long, value_enum, default_value_t = StorageMode::Sparse)]
    pub storage: StorageMode,

    /// Worker threads (default: all cores).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Reservoir offset applied to every date without its own offset column.
    #[arg(long, default_value_t = 0.0)]
    pub reservoir_offset: f64,

    #[arg(long, default_value_t = 0.0)]
    pub reservoir_offset_error: f64,

    /// Export the calibrated dates (metadata + densities) to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Export medians and HPD intervals to CSV.
    #[arg(long = "export-summary", value_name = "CSV")]
    pub export_summary: Option<PathBuf>,

    /// Write one `<id>.csv` calendar density per date into this directory.
    #[arg(long = "export-grids", value_name = "DIR")]
    pub export_grids: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct UncalibrateArgs {
    /// Calendar ages (BP), comma-separated.
    #[arg(long = "cal-bp", value_delimiter = ',', required_unless_present = "grid")]
    pub cal_bp: Vec<f64>,

    /// Measurement error added to each draw.
    #[arg(long, default_value_t = 0.0)]
    pub error: f64,

    /// Seed for the random draws (random if omitted).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Round curve ages and errors to whole years before drawing.
    #[arg(long)]
    pub round: bool,

    /// Invert a calendar density CSV (`cal_bp,pr_dens`) instead of point ages.
    #[arg(long, value_name = "CSV", conflicts_with = "cal_bp")]
    pub grid: Option<PathBuf>,

    /// Write the inverted radiocarbon density to CSV (grid mode only).
    #[arg(long, value_name = "CSV", requires = "grid")]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = crate::calibrate::DEFAULT_EPS)]
    pub eps: f64,

    #[command(flatten)]
    pub curves: CurveArgs,
}

#[derive(Debug, Args, Clone)]
pub struct MixArgs {
    #[arg(long, value_enum, default_value_t = CurveName::Intcal20)]
    pub terrestrial: CurveName,

    #[arg(long, value_enum, default_value_t = CurveName::Marine20)]
    pub marine: CurveName,

    /// Weight of the terrestrial curve, in [0, 1].
    #[arg(short = 'p', long, default_value_t = 0.5)]
    pub p: f64,

    /// Reservoir offset added to the marine curve.
    #[arg(long, default_value_t = 0.0)]
    pub offset: f64,

    #[arg(long, default_value_t = 0.0)]
    pub offset_error: f64,

    #[arg(long = "curve-dir", value_name = "DIR")]
    pub curve_dir: Option<PathBuf>,

    /// Write the mixed curve as a three-column CSV.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrate_single_age_parses() {
        let cli = Cli::parse_from([
            "c14", "calibrate", "--age", "4000", "--error", "30", "--curve", "shcal20",
            "--storage", "dense",
        ]);
        let Command::Calibrate(args) = cli.command else {
            panic!("expected calibrate");
        };
        assert_eq!(args.age, Some(4000.0));
        assert_eq!(args.curves.curve, CurveName::Shcal20);
        assert_eq!(args.storage, StorageMode::Dense);
        assert_eq!(args.start_bp, 50_000);
    }

    #[test]
    fn uncalibrate_accepts_comma_separated_ages() {
        let cli = Cli::parse_from([
            "c14", "uncalibrate", "--cal-bp", "1000,2000,3000", "--seed", "7",
        ]);
        let Command::Uncalibrate(args) = cli.command else {
            panic!("expected uncalibrate");
        };
        assert_eq!(args.cal_bp, vec![1000.0, 2000.0, 3000.0]);
        assert_eq!(args.seed, Some(7));
    }

    #[test]
    fn input_and_age_conflict() {
        let res = Cli::try_parse_from([
            "c14", "calibrate", "-i", "dates.csv", "--age", "100", "--error", "10",
        ]);
        assert!(res.is_err());
    }
}
