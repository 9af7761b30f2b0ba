use anyhow::{Context, Result};
use chrono::Local;
use comfy_table::{Cell, Table};
use vigil_core::{TaskKind, TaskResult};
use vigil_store::{JsonFileStore, ResultStore, StoredRecord};

use crate::cli::HistoryArgs;
use crate::config::AppConfig;

pub fn print(config: &AppConfig, args: &HistoryArgs) -> Result<()> {
    let dir = args.store_dir.as_ref().unwrap_or(&config.store.dir);
    let store = JsonFileStore::open(dir).context("opening result store")?;
    let records = store
        .list(args.task, args.skip, args.limit)
        .with_context(|| format!("listing {} results", args.task))?;

    if records.is_empty() {
        println!("No {} results in {}", args.task, dir.display());
        return Ok(());
    }
    println!("{}", table(args.task, &records));
    Ok(())
}

/// One row per record, newest first, with the columns of `kind`.
pub fn table(kind: TaskKind, records: &[StoredRecord]) -> Table {
    let mut table = Table::new();
    let header: &[&str] = match kind {
        TaskKind::Pvt => &["Completed", "Attempts", "Misses", "Mean RT", "Accuracy"],
        TaskKind::Flanker => &["Completed", "Correct", "Congruent", "Incongruent", "Mean RT"],
        TaskKind::Efsi => &["Completed", "Score", "Assessment"],
        TaskKind::Vas => &["Completed", "Sleepiness", "Fatigue"],
    };
    table.set_header(header.to_vec());

    for record in records {
        let when = record
            .completed_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        let mut row = vec![Cell::new(when)];
        match &record.result {
            TaskResult::Pvt(r) => row.extend([
                Cell::new(r.attempts()),
                Cell::new(r.miss_count),
                Cell::new(format!("{:.0} ms", r.average_reaction_time)),
                Cell::new(format!("{:.1}%", r.accuracy_percent())),
            ]),
            TaskResult::Flanker(r) => row.extend([
                Cell::new(format!("{}/{}", r.total_correct, r.total_trials)),
                Cell::new(r.congruent_correct),
                Cell::new(r.incongruent_correct),
                Cell::new(format!("{:.0} ms", r.mean_reaction_time_ms())),
            ]),
            TaskResult::Efsi(r) => row.extend([
                Cell::new(r.total_score),
                Cell::new(r.risk().message()),
            ]),
            TaskResult::Vas(r) => row.extend([
                Cell::new(format!(
                    "{} ({})",
                    r.sleepiness_score,
                    r.sleepiness().sleepiness_label()
                )),
                Cell::new(format!("{} ({})", r.fatigue_score, r.fatigue().fatigue_label())),
            ]),
        }
        table.add_row(row);
    }
    table
}
