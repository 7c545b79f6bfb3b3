use std::path::PathBuf;

use clap::{Args, Parser};
use libmotif::fold::{FoldingStrategy, NestedFold, PseudoknotFold, DEFAULT_MAX_LEVELS};
use log::LevelFilter;

use crate::pipeline::{PipelineConfig, DEFAULT_MAX_LENGTH};

#[derive(Parser, Debug)]
#[command(name = "rnamotif")]
#[command(
    about = "Predict consensus structures for RNA seed alignments and partition them into searchable motifs"
)]
pub struct Cli {
    /// Seed alignment file
    #[arg(value_name = "SEED.sto")]
    pub seed_path: PathBuf,

    /// Where to place the motifs, one JSON object per line
    #[arg(value_name = "MOTIF.json")]
    pub motif_path: PathBuf,

    /// Arguments that control structure prediction
    #[command(flatten)]
    pub fold_args: FoldArgs,

    /// Arguments that control logging
    #[command(flatten)]
    pub verbosity: VerbosityArgs,

    /// Arguments that are common to the whole run
    #[command(flatten)]
    pub common_args: CommonArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FoldArgs {
    /// Predict structures that may include pseudoknots
    #[arg(short = 'p', long = "pseudoknot", action)]
    pub pseudoknot: bool,

    /// Constrain each prediction with the seed consensus structure (#=GC SS_cons)
    #[arg(short = 'c', long = "constrain", action)]
    pub constrain: bool,

    /// The number of folding levels used in pseudoknot mode
    #[arg(long = "pk-levels", default_value_t = DEFAULT_MAX_LEVELS, value_name = "n")]
    pub pseudoknot_levels: usize,

    /// Skip alignments whose first sequence is longer than this, gaps removed
    #[arg(
        short = 'L',
        long = "max-length",
        default_value_t = DEFAULT_MAX_LENGTH,
        value_name = "n"
    )]
    pub max_length: usize,
}

#[derive(Args, Debug, Clone, Default)]
#[group(multiple = false)]
pub struct VerbosityArgs {
    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet", action)]
    pub quiet: bool,

    /// Log per-record details
    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    /// Log everything, including folding internals
    #[arg(long = "vv", visible_alias = "very-verbose", action)]
    pub very_verbose: bool,
}

impl VerbosityArgs {
    pub fn level_filter(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Warn
        } else if self.very_verbose {
            LevelFilter::Trace
        } else if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// The number of threads that rnamotif will use
    #[arg(
        short = 't',
        long = "threads",
        default_value_t = 8usize,
        value_name = "n"
    )]
    pub num_threads: usize,

    /// Allow rnamotif to overwrite files
    #[arg(long = "allow-overwrite", default_value_t = false)]
    pub allow_overwrite: bool,
}

impl FoldArgs {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            constrain: self.constrain,
            max_length: self.max_length,
        }
    }

    pub fn folding_strategy(&self) -> Box<dyn FoldingStrategy> {
        if self.pseudoknot {
            Box::new(PseudoknotFold::new(self.pseudoknot_levels))
        } else {
            Box::new(NestedFold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn test_defaults() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["rnamotif", "seed.sto", "motif.json"])?;

        check!(cli.seed_path == PathBuf::from("seed.sto"));
        check!(cli.verbosity.level_filter() == LevelFilter::Info);
        check!(cli.common_args.num_threads == 8);
        check!(!cli.common_args.allow_overwrite);
        check!(cli.fold_args.max_length == 1000);
        check!(cli.fold_args.folding_strategy().name() == NestedFold.name());

        let config = cli.fold_args.pipeline_config();
        check!(!config.constrain);
        Ok(())
    }

    #[test]
    fn test_fold_flags() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "rnamotif", "-p", "-c", "-L", "500", "-t", "2", "a.sto", "b.json",
        ])?;

        check!(cli.fold_args.folding_strategy().name() == PseudoknotFold::default().name());
        check!(cli.fold_args.pipeline_config().constrain);
        check!(cli.fold_args.pipeline_config().max_length == 500);
        check!(cli.common_args.num_threads == 2);
        Ok(())
    }

    #[test]
    fn test_verbosity_levels() -> anyhow::Result<()> {
        let level = |flag: &str| -> anyhow::Result<LevelFilter> {
            Ok(Cli::try_parse_from(["rnamotif", flag, "a.sto", "b.json"])?
                .verbosity
                .level_filter())
        };

        check!(level("-q")? == LevelFilter::Warn);
        check!(level("-v")? == LevelFilter::Debug);
        check!(level("--vv")? == LevelFilter::Trace);
        check!(level("--very-verbose")? == LevelFilter::Trace);
        Ok(())
    }

    #[test]
    fn test_verbosity_flags_are_exclusive() {
        let_assert!(Err(err) = Cli::try_parse_from(["rnamotif", "-q", "-v", "a.sto", "b.json"]));
        check!(err.kind() == clap::error::ErrorKind::ArgumentConflict);

        let_assert!(Err(_) = Cli::try_parse_from(["rnamotif", "a.sto"]));
    }
}
