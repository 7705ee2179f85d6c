// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses arguments, sets up logging and hands off to Layer 2.
//
//   1. `train`    - TrainUseCase
//   2. `evaluate` - EvaluateUseCase
//   3. `models`   - registry listing
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{init_seed, CommonArgs, Commands, EvaluateArgs, TrainArgs};

use crate::{
    application::{evaluate_use_case::EvaluateUseCase, train_use_case::TrainUseCase},
    infra::logging::init_logging,
    ml::registry,
};

#[derive(Parser, Debug)]
#[command(
    name = "imgcls-train",
    version,
    about = "Train and evaluate image classification CNNs on ImageNet-style folders."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Models => {
                for name in registry::available_models() {
                    println!("{name}");
                }
                Ok(())
            }
        }
    }
}

/// Logger first, then the command line and arguments, as the first log lines.
fn start_run(common: &CommonArgs, args: &impl std::fmt::Debug) -> Result<u64> {
    let seed = init_seed(common.seed);
    let log_file = init_logging(common.save_dir().as_deref(), &common.logging_file_name)?;
    if let Some(path) = log_file {
        tracing::info!("Logging to '{}'", path.display());
    }
    let argv: Vec<String> = std::env::args().collect();
    tracing::info!("Script command line:\n{}", argv.join(" "));
    tracing::info!("Script arguments:\n{:#?}", args);
    tracing::info!("Seed: {}", seed);
    Ok(seed)
}

fn run_train(args: TrainArgs) -> Result<()> {
    let seed = start_run(&args.common, &args)?;
    registry::check(&args.common.model)?;

    let report = TrainUseCase::new(args.into_config(seed)).execute()?;
    if let Some(best) = report.best {
        println!("Training complete. Best score {:.4} at epoch {}.", best.value, best.epoch);
    } else {
        println!("Training complete.");
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let seed = start_run(&args.common, &args)?;
    registry::check(&args.common.model)?;

    let report = EvaluateUseCase::new(args.into_config(seed)).execute()?;
    println!(
        "err-top1={:.4}\terr-top5={:.4}",
        report.top1_err, report.top5_err
    );
    Ok(())
}
