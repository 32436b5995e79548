use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tenantshift::{EventJournal, MigrationEvent, MigrationEventType};

#[derive(Parser)]
#[command(name = "migrate-tool")]
#[command(about = "Operator tooling for tenantshift migration journals")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List journaled migration events, oldest first
    Events {
        #[arg(long)]
        journal: PathBuf,
        #[arg(long)]
        workspace: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Verify the audit-ordering invariants of a journal
    Audit {
        #[arg(long)]
        journal: PathBuf,
    },
    /// Per-workspace event counts and last activity
    Summary {
        #[arg(long)]
        journal: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Events {
            journal,
            workspace,
            limit,
        } => list_events(&journal, workspace.as_deref(), limit),
        Command::Audit { journal } => audit(&journal),
        Command::Summary { journal } => summary(&journal),
    }
}

fn read_journal(path: &PathBuf) -> Result<Vec<MigrationEvent>> {
    EventJournal::read_path(path)
        .with_context(|| format!("Failed to read journal '{}'", path.display()))
}

fn list_events(path: &PathBuf, workspace: Option<&str>, limit: Option<usize>) -> Result<()> {
    let events = read_journal(path)?;
    let filtered = events
        .iter()
        .filter(|e| workspace.is_none_or(|ws| e.workspace_id == ws));
    let mut printed = 0usize;
    for event in filtered {
        if limit.is_some_and(|l| printed >= l) {
            break;
        }
        let details = if event.details.is_empty() {
            String::new()
        } else {
            format!(" {}", serde_json::Value::Object(event.details.clone()))
        };
        println!(
            "{} {} {}{}",
            event.timestamp.to_rfc3339(),
            event.workspace_id,
            event.event_type,
            details
        );
        printed += 1;
    }
    println!("{} event(s)", printed);
    Ok(())
}

fn audit(path: &PathBuf) -> Result<()> {
    let events = read_journal(path)?;
    let mut issues = Vec::new();

    let mut by_workspace: BTreeMap<&str, Vec<&MigrationEvent>> = BTreeMap::new();
    for event in &events {
        by_workspace
            .entry(event.workspace_id.as_str())
            .or_default()
            .push(event);
    }

    for (workspace, events) in &by_workspace {
        let mut rollbacks_open = 0i64;
        let mut cutovers_open = 0i64;
        for event in events {
            match event.event_type {
                MigrationEventType::RollbackStarted => rollbacks_open += 1,
                MigrationEventType::RollbackCompleted => {
                    rollbacks_open -= 1;
                    if rollbacks_open < 0 {
                        issues.push(format!(
                            "{}: rollback_completed without preceding rollback_started",
                            workspace
                        ));
                    }
                }
                MigrationEventType::CutoverStarted => cutovers_open += 1,
                MigrationEventType::CutoverCompleted | MigrationEventType::CutoverAborted => {
                    cutovers_open -= 1;
                    if cutovers_open < 0 {
                        issues.push(format!(
                            "{}: {} without preceding cutover_started",
                            workspace, event.event_type
                        ));
                    }
                }
                _ => {}
            }
        }
        if rollbacks_open > 0 {
            issues.push(format!("{}: rollback_started never completed", workspace));
        }
    }

    println!("Journal: {}", path.display());
    println!("Events: {}", events.len());
    if issues.is_empty() {
        println!("Ordering: OK");
        return Ok(());
    }
    println!("Ordering: FAILED");
    for issue in &issues {
        println!("- {}", issue);
    }
    Err(anyhow!("{} ordering issue(s) found", issues.len()))
}

fn summary(path: &PathBuf) -> Result<()> {
    let events = read_journal(path)?;
    let mut by_workspace: BTreeMap<&str, (usize, &MigrationEvent)> = BTreeMap::new();
    for event in &events {
        by_workspace
            .entry(event.workspace_id.as_str())
            .and_modify(|(count, last)| {
                *count += 1;
                *last = event;
            })
            .or_insert((1, event));
    }

    println!("Journal: {}", path.display());
    for (workspace, (count, last)) in &by_workspace {
        println!(
            "- {}: {} event(s), last {} at {}",
            workspace,
            count,
            last.event_type,
            last.timestamp.to_rfc3339()
        );
    }
    Ok(())
}
