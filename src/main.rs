use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use wbs_scheduler::engine::{detect_circular_dependencies, find_cycles};
use wbs_scheduler::io::{export_csv, import_csv, load_project, save_project};
use wbs_scheduler::{
    DependencyKind, ItemPatch, PersistSink, Predecessor, Project, Settings, WbsItem,
};

#[derive(Parser, Debug)]
#[command(name = "wbs")]
#[command(about = "Schedule and inspect Work Breakdown Structure project files")]
struct Args {
    /// Settings file (defaults to the OS config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the reconstructed tree
    Tree {
        file: PathBuf,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report schedule violations and dependency cycles
    Validate { file: PathBuf },
    /// Report dependency cycles, optionally only those reachable from one task
    Cycles {
        file: PathBuf,
        #[arg(long)]
        task: Option<String>,
    },
    /// Cascade a task's dates to everything downstream
    Schedule {
        file: PathBuf,
        id: String,
        /// Move the task to this start date first (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Save the result back to the file
        #[arg(long)]
        write: bool,
    },
    /// Recompute every parent's progress and status
    Rollup {
        file: PathBuf,
        #[arg(long)]
        write: bool,
    },
    /// Renumber all items to a flat sequence in creation order
    Renumber {
        file: PathBuf,
        #[arg(long)]
        write: bool,
    },
    /// Add an item with the next free WBS id
    Add {
        file: PathBuf,
        title: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        duration: Option<i64>,
    },
    /// Make SUCCESSOR depend on PREDECESSOR
    Link {
        file: PathBuf,
        successor: String,
        predecessor: String,
        #[arg(long = "type", default_value = "FS")]
        kind: DependencyKind,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        lag: i64,
    },
    /// Remove every link from SUCCESSOR to PREDECESSOR
    Unlink {
        file: PathBuf,
        successor: String,
        predecessor: String,
    },
    /// Delete an item and its subtree
    Delete { file: PathBuf, id: String },
    /// Create a project file from a CSV export
    ImportCsv {
        csv: PathBuf,
        out: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Write a project's items as CSV
    ExportCsv { file: PathBuf, out: PathBuf },
    /// Print the effective settings
    Settings {
        /// Write them to the settings file, creating it if needed
        #[arg(long)]
        write: bool,
    },
}

/// Reports every cascaded write; the project file is the store.
struct ConsoleSink;

#[async_trait]
impl PersistSink for ConsoleSink {
    async fn persist(&self, id: &str, patch: &ItemPatch) -> Result<()> {
        println!("  {id}: {}", serde_json::to_string(patch)?);
        Ok(())
    }
}

fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_tree(nodes: &[WbsItem], depth: usize) {
    for node in nodes {
        let dates = match (node.start_date, node.end_date) {
            (Some(s), Some(e)) => format!("{s} .. {e}"),
            (Some(s), None) => format!("{s} .."),
            _ => "unscheduled".to_string(),
        };
        println!(
            "{:indent$}{} {}  [{}]  {}% {}",
            "",
            node.wbs_id(),
            node.title,
            dates,
            node.progress(),
            node.status(),
            indent = depth * 2
        );
        print_tree(node.children(), depth + 1);
    }
}

fn save(project: &mut Project, file: &PathBuf) -> Result<()> {
    project.touch();
    save_project(project, file).with_context(|| format!("saving {}", file.display()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let settings_path = args.settings.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&settings_path)?;
    init_tracing(&settings);

    let open = |file: &PathBuf| {
        load_project(file).with_context(|| format!("loading {}", file.display()))
    };

    match args.command {
        Command::Tree { file, json } => {
            let tree = open(&file)?.tree();
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                print_tree(&tree, 0);
            }
        }
        Command::Validate { file } => {
            let violations = open(&file)?.validate();
            if violations.is_empty() {
                println!("No schedule violations.");
            } else {
                for v in &violations {
                    println!("{v}");
                }
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Cycles { file, task } => {
            let tasks = open(&file)?.tasks();
            if let Some(task) = task {
                if detect_circular_dependencies(&task, &tasks) {
                    println!("A dependency cycle is reachable from {task}.");
                    return Ok(ExitCode::FAILURE);
                }
                println!("No cycle reachable from {task}.");
            } else {
                let cycles = find_cycles(&tasks);
                for cycle in &cycles {
                    println!("{}", cycle.join(" -> "));
                }
                if !cycles.is_empty() {
                    return Ok(ExitCode::FAILURE);
                }
                println!("No dependency cycles.");
            }
        }
        Command::Schedule { file, id, start, write } => {
            let mut project = open(&file)?;
            println!("Writes:");
            let report = match start {
                Some(start) => project.reschedule(&id, start, &ConsoleSink).await?,
                None => project.cascade_from(&id, &ConsoleSink).await,
            };
            println!(
                "{} rescheduled, {} failed, {} skipped on cycles",
                report.updated.len(),
                report.failed.len(),
                report.skipped_cyclic.len()
            );
            for id in &report.skipped_cyclic {
                println!("  cyclic: {id}");
            }
            if write {
                save(&mut project, &file)?;
            }
        }
        Command::Rollup { file, write } => {
            let mut project = open(&file)?;
            let changed = project.recompute_rollups();
            for parent in &changed {
                println!("{}: {}% {}", parent.id, parent.progress, parent.status);
            }
            if write && !changed.is_empty() {
                save(&mut project, &file)?;
            }
        }
        Command::Renumber { file, write } => {
            let mut project = open(&file)?;
            let updates = project.renumber();
            for update in &updates {
                println!("{} -> {}", update.id, update.wbs_id);
            }
            if write && !updates.is_empty() {
                save(&mut project, &file)?;
            }
        }
        Command::Add { file, title, parent, start, duration } => {
            let mut project = open(&file)?;
            let duration = duration.unwrap_or(settings.default_duration);
            let id = project.add_item(title, parent.as_deref(), start, duration)?;
            save(&mut project, &file)?;
            println!("{id}");
        }
        Command::Link { file, successor, predecessor, kind, lag } => {
            let mut project = open(&file)?;
            project.add_predecessor(&successor, Predecessor::new(predecessor, kind, lag))?;
            save(&mut project, &file)?;
        }
        Command::Unlink { file, successor, predecessor } => {
            let mut project = open(&file)?;
            project.remove_predecessor(&successor, &predecessor)?;
            save(&mut project, &file)?;
        }
        Command::Delete { file, id } => {
            let mut project = open(&file)?;
            let deleted = project.delete_item(&id)?;
            save(&mut project, &file)?;
            println!("Deleted {} item(s).", deleted.len());
        }
        Command::ImportCsv { csv, out, name } => {
            let (rows, skipped) = import_csv(&csv)?;
            let name = name.unwrap_or_else(|| {
                csv.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "Imported Project".to_string())
            });
            let mut project = Project::new(name);
            project.items = rows;
            project.normalize();
            project.recompute_rollups();
            save(&mut project, &out)?;
            println!("Imported {} item(s), skipped {skipped}.", project.items.len());
        }
        Command::ExportCsv { file, out } => {
            let tasks = open(&file)?.tasks();
            let written = export_csv(&tasks, &out, settings.delimiter_byte())?;
            println!("Exported {written} item(s).");
        }
        Command::Settings { write } => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            if write {
                settings
                    .save(&settings_path)
                    .with_context(|| format!("writing {}", settings_path.display()))?;
                println!("Saved to {}.", settings_path.display());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
