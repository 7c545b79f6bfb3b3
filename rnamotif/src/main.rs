mod args;
mod output;
mod pipeline;
mod util;

use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use log::info;

use args::Cli;
use libmotif::stockholm::parse_stockholm;
use output::write_motifs;
use pipeline::{run_pipeline, run_pipeline_serial, Pipeline, RunReport};
use util::{init_logging, set_threads, PathBufExt};

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity.level_filter())?;
    set_threads(cli.common_args.num_threads)?;

    // open the output first so a refused overwrite doesn't waste a run
    let mut writer = cli
        .motif_path
        .open(cli.common_args.allow_overwrite)
        .context("failed to open motif output")?;

    let now = Instant::now();
    let records = parse_stockholm(&cli.seed_path)?;
    info!(
        "{} records read in {:.3}s",
        records.len(),
        now.elapsed().as_secs_f64()
    );

    let pipeline = Pipeline::new(
        cli.fold_args.pipeline_config(),
        cli.fold_args.folding_strategy(),
    );
    info!(
        "folding with {}{}",
        pipeline.folding.name(),
        if pipeline.config.constrain {
            ", constrained by SS_cons"
        } else {
            ""
        }
    );

    let now = Instant::now();
    let slots = if cli.common_args.num_threads == 1 {
        run_pipeline_serial(&records, &pipeline)
    } else {
        run_pipeline(&records, &pipeline)
    };
    RunReport::from_slots(&slots).log(now.elapsed());

    write_motifs(&slots, &mut writer)?;
    info!("motifs written to {}", cli.motif_path.to_string_lossy());

    Ok(())
}
