mod app;
mod cli;
mod config;
mod history;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;
use vigil_core::EfsiResult;
use vigil_store::{FileNoteSink, JsonFileStore};

use crate::app::App;
use crate::cli::{Cli, Command, RunArgs};
use crate::config::AppConfig;
use crate::session::{Session, Surveys};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Run(args) => run(config, args),
        Command::History(args) => history::print(&config, &args),
    }
}

fn run(mut config: AppConfig, args: RunArgs) -> Result<()> {
    config.apply_run_args(&args);

    let efsi = args
        .efsi
        .map(EfsiResult::from_answers)
        .transpose()
        .context("invalid --efsi answers")?;
    let surveys = Surveys {
        efsi,
        vas: args.vas,
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let store = JsonFileStore::open(&config.store.dir)
        .with_context(|| format!("opening result store {}", config.store.dir.display()))?;
    tracing::info!(
        task = ?args.task,
        seed = args.seed,
        store = %config.store.dir.display(),
        debug = config.flow.debug,
        "starting run"
    );

    let mut session = Session::new(
        args.task,
        config.flow.debug,
        StdRng::from_rng(&mut rng),
        store,
        surveys,
    )?;
    if let Some(dir) = &config.notes.dir {
        session = session.with_notes(Box::new(FileNoteSink::new(dir)));
    }

    App::new(config, session, rng).run()
}
