//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves calibration curves
//! - runs calibration, uncalibration or curve mixing
//! - prints reports
//! - writes optional exports

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cli::{CalibrateArgs, Command, MixArgs, UncalibrateArgs};
use crate::curve::{MixParams, mix_named_curves};
use crate::domain::PerDate;
use crate::error::AppError;
use crate::uncalibrate::{UncalibrateOptions, uncalibrate_grid, uncalibrate_points};

pub mod pipeline;

use pipeline::{CalibrateConfig, DateInput};

/// Entry point for the `c14` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Uncalibrate(args) => handle_uncalibrate(args),
        Command::Mix(args) => handle_mix(args),
    }
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let config = calibrate_config_from_args(&args)?;
    let run = pipeline::run_calibration(&config)?;

    println!(
        "{}",
        crate::report::format_calibration_summary(&run.store, &run.summaries)
    );

    // Optional exports.
    if let Some(path) = &args.export {
        crate::io::export::write_store_json(path, &run.store)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &args.export_summary {
        let file = std::fs::File::create(path)
            .map_err(|e| AppError::new(4, format!("IO error for '{}': {e}", path.display())))?;
        crate::io::export::write_summary_csv(file, &run.summaries)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(dir) = &args.export_grids {
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::new(4, format!("IO error for '{}': {e}", dir.display())))?;
        for (i, record) in run.store.metadata().iter().enumerate() {
            if let Some(grid) = run.store.grid(i) {
                let path = dir.join(format!("{}.csv", record.date_id));
                crate::io::export::write_grid_csv(&path, &grid)?;
            }
        }
        log::info!("wrote {} grids to {}", run.store.len(), dir.display());
    }

    Ok(())
}

fn handle_uncalibrate(args: UncalibrateArgs) -> Result<(), AppError> {
    let source = pipeline::curve_source(args.curves.curve_dir.as_deref());
    let curve = pipeline::curve_choice(args.curves.curve, args.curves.curve_file.as_deref())?
        .resolve(&source)?;

    if let Some(grid_path) = &args.grid {
        let grid = crate::io::ingest::load_cal_grid(grid_path)?;
        let opts = UncalibrateOptions {
            eps: args.eps,
            ..UncalibrateOptions::default()
        };
        let uncal = uncalibrate_grid(&grid, &curve, &opts)?;
        print!("{}", crate::report::format_uncal_grid(&uncal));
        if let Some(path) = &args.output {
            crate::io::export::write_uncal_grid_csv(path, &uncal)?;
            log::info!("wrote {}", path.display());
        }
        return Ok(());
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let points = uncalibrate_points(
        &args.cal_bp,
        &PerDate::Shared(args.error),
        &curve,
        args.round,
        &mut rng,
    )?;
    print!("{}", crate::report::format_uncal_points(curve.name(), &points));
    Ok(())
}

fn handle_mix(args: MixArgs) -> Result<(), AppError> {
    if !args.marine.is_marine() {
        log::warn!("'{}' is not a marine curve", args.marine);
    }
    let source = pipeline::curve_source(args.curve_dir.as_deref());
    let params = MixParams {
        p: args.p,
        reservoir_offset: args.offset,
        reservoir_offset_error: args.offset_error,
    };
    let mixed = mix_named_curves(&source, args.terrestrial, args.marine, params)?;
    print!("{}", crate::report::format_curve_info(&mixed));

    if let Some(path) = &args.output {
        crate::io::curve::write_curve_csv(path, &mixed)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

pub fn calibrate_config_from_args(args: &CalibrateArgs) -> Result<CalibrateConfig, AppError> {
    let input = match (&args.input, args.age, args.error) {
        (Some(path), _, _) => DateInput::Csv(path.clone()),
        (None, Some(age), Some(error)) => DateInput::Single {
            id: args.id.clone(),
            age,
            error,
        },
        _ => {
            return Err(AppError::new(
                2,
                "nothing to calibrate: pass --input CSV or --age/--error",
            ));
        }
    };

    Ok(CalibrateConfig {
        input,
        curve: args.curves.curve,
        curve_file: args.curves.curve_file.clone(),
        curve_dir: args.curves.curve_dir.clone(),
        start_bp: args.start_bp,
        end_bp: args.end_bp,
        normalised: !args.no_normalise,
        f14c: args.f14c,
        eps: args.eps,
        storage: args.storage,
        workers: args.workers,
        reservoir_offset: args.reservoir_offset,
        reservoir_offset_error: args.reservoir_offset_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn calibrate_args(argv: &[&str]) -> CalibrateArgs {
        let mut full = vec!["c14", "calibrate"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Calibrate(args) => args,
            _ => panic!("expected calibrate"),
        }
    }

    #[test]
    fn single_age_becomes_single_input() {
        let args = calibrate_args(&[
            "--age",
            "4000",
            "--error",
            "30",
            "--id",
            "x",
            "--no-normalise",
        ]);
        let cfg = calibrate_config_from_args(&args).unwrap();
        assert_eq!(
            cfg.input,
            DateInput::Single {
                id: Some("x".to_string()),
                age: 4000.0,
                error: 30.0
            }
        );
        assert!(!cfg.normalised);
    }

    #[test]
    fn missing_input_is_a_usage_error() {
        let args = calibrate_args(&[]);
        let err = calibrate_config_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
