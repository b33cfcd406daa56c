use crate::error::{Result, WbsError};
use crate::model::{Predecessor, WbsItem};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub const HEADERS: [&str; 9] = [
    "WBS",
    "Title",
    "Start Date",
    "End Date",
    "Duration",
    "Progress",
    "Status",
    "Predecessors",
    "Id",
];

/// Encode a link as `<wbs><TYPE>[+/-lag]`, e.g. `1.2FS+2` or `3SS`.
pub fn format_predecessor(wbs_id: &str, link: &Predecessor) -> String {
    match link.lag {
        0 => format!("{}{}", wbs_id, link.kind),
        lag => format!("{}{}{:+}", wbs_id, link.kind, lag),
    }
}

/// Write tasks as delimited text. Predecessors are written by WBS id so the
/// file reads naturally in a spreadsheet; links to unknown items are omitted.
pub fn write_csv<W: Write>(tasks: &[WbsItem], writer: W, delimiter: u8) -> Result<usize> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(HEADERS)?;

    let paths: HashMap<&str, &str> = tasks.iter().map(|t| (t.id.as_str(), t.wbs_id())).collect();

    for task in tasks {
        let preds: Vec<String> = task
            .predecessors
            .iter()
            .filter_map(|p| paths.get(p.id.as_str()).map(|wbs| format_predecessor(wbs, p)))
            .collect();
        let date = |d: Option<chrono::NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
        };
        wtr.write_record([
            task.wbs_id().to_string(),
            task.title.clone(),
            date(task.start_date),
            date(task.end_date),
            task.duration.map(|d| d.to_string()).unwrap_or_default(),
            task.progress().to_string(),
            task.status().label().to_string(),
            preds.join(","),
            task.id.clone(),
        ])
        .map_err(|e| WbsError::Csv(format!("failed to write task '{}': {}", task.title, e)))?;
    }

    wtr.flush().map_err(|e| WbsError::Csv(format!("failed to flush CSV: {e}")))?;
    Ok(tasks.len())
}

/// Export tasks to a CSV file. Returns the number of tasks written.
pub fn export_csv(tasks: &[WbsItem], path: &Path, delimiter: u8) -> Result<usize> {
    let file = std::fs::File::create(path).map_err(|e| WbsError::io(path, e))?;
    write_csv(tasks, file, delimiter)
}
