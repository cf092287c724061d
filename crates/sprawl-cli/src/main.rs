use clap::Parser;
use sprawl_batch::run_campaign;
use sprawl_engine::SimContext;
use sprawl_scenarios::ProcessingMode;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

mod cli;

use cli::{thread_count, Cli};

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mode: ProcessingMode = cli.mode.into();
    let scenario = sprawl_scenarios::load(&cli.scenario_file)?;
    if scenario.echo {
        println!("{}", scenario.echo_json());
    }
    let ctx = SimContext::load(scenario, mode)?;
    let threads = thread_count(&cli.threads, mode);
    info!(
        mode = mode.as_str(),
        threads,
        runs = ctx.total_runs(),
        monte_carlo = ctx.scenario.monte_carlo_iterations,
        "campaign starting"
    );
    let summary = run_campaign(&ctx, threads)?;
    info!(runs_completed = summary.runs_completed, "campaign finished");
    if let Some(best) = summary.best {
        println!(
            "best tuple: run {} product {:.5} (diffusion {:.0}, breed {:.0}, spread {:.0}, \
             slope resistance {:.0}, road gravity {:.0})",
            best.run,
            best.product,
            best.diffusion,
            best.breed,
            best.spread,
            best.slope_resistance,
            best.road_gravity
        );
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(err) = run(&cli) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
