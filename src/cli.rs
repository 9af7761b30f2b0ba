use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vigil_core::{TaskKind, VasResult};

#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Fatigue-assessment tasks: PVT, Flanker and surveys")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one task, or all four in sequence
    Run(RunArgs),

    /// List stored results
    History(HistoryArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskChoice {
    Pvt,
    Flanker,
    All,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, value_enum, default_value_t = TaskChoice::All)]
    pub task: TaskChoice,

    /// Seed for stimulus timing and order
    #[arg(long)]
    pub seed: Option<u64>,

    /// Result directory (overrides [store] dir)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Allow skipping tasks with placeholder results
    #[arg(long)]
    pub debug: bool,

    /// The 26 EFSI answers, comma-separated (1-4 each)
    #[arg(long, value_delimiter = ',')]
    pub efsi: Option<Vec<u8>>,

    /// VAS sleepiness and fatigue as S,F (0-100 each)
    #[arg(long, value_parser = parse_vas)]
    pub vas: Option<VasResult>,

    /// Export a note summary here after an all-tasks run (overrides [notes] dir)
    #[arg(long)]
    pub notes_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[arg(long, default_value = "pvt")]
    pub task: TaskKind,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    #[arg(long)]
    pub store_dir: Option<PathBuf>,
}

fn parse_vas(s: &str) -> Result<VasResult, String> {
    let (sleepiness, fatigue) = s
        .split_once(',')
        .ok_or_else(|| format!("expected SLEEPINESS,FATIGUE, got `{s}`"))?;
    let parse = |v: &str| v.trim().parse::<u8>().map_err(|e| format!("`{v}`: {e}"));
    VasResult::new(parse(sleepiness)?, parse(fatigue)?).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let efsi = vec!["2"; 26].join(",");
        let cli = Cli::parse_from([
            "vigil", "run", "--task", "all", "--seed", "7", "--efsi", &efsi, "--vas", "35,72",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.task, TaskChoice::All);
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.efsi.as_deref().map(<[u8]>::len), Some(26));
        assert_eq!(args.vas, Some(VasResult::new(35, 72).unwrap()));
    }

    #[test]
    fn vas_out_of_range_is_rejected() {
        assert!(parse_vas("101,3").is_err());
        assert!(parse_vas("40").is_err());
        assert!(Cli::try_parse_from(["vigil", "run", "--vas", "5,x"]).is_err());
    }

    #[test]
    fn history_parses_task_kind() {
        let cli = Cli::parse_from(["vigil", "history", "--task", "flanker", "--limit", "5"]);
        let Command::History(args) = cli.command else {
            panic!("expected history");
        };
        assert_eq!(args.task, TaskKind::Flanker);
        assert_eq!(args.limit, 5);
    }
}
