use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDate, Utc};

use crate::error::{Result, WbsError};
use crate::model::{DependencyKind, Predecessor, Status, WbsRow};

/// Try parsing a date string with several common formats.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

/// Detect delimiter by checking the first line for common separators.
fn detect_delimiter(first_line: &str) -> u8 {
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    let tabs = first_line.matches('\t').count();

    if semicolons >= commas && semicolons >= tabs {
        b';'
    } else if tabs >= commas {
        b'\t'
    } else {
        b','
    }
}

/// Normalize a header string to a canonical column key.
fn normalize_header(h: &str) -> String {
    h.trim().to_lowercase().replace([' ', '-', '_'], "")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Wbs,
    Title,
    Start,
    End,
    Duration,
    Progress,
    Status,
    Predecessors,
    Id,
    Description,
}

fn header_to_col(normalized: &str) -> Option<Column> {
    match normalized {
        "wbs" | "wbsid" | "wbscode" | "code" | "outline" | "outlinenumber" => Some(Column::Wbs),
        "title" | "name" | "task" | "taskname" | "activity" | "item" => Some(Column::Title),
        "start" | "startdate" | "from" | "begin" => Some(Column::Start),
        "end" | "enddate" | "finish" | "finishdate" | "to" | "due" => Some(Column::End),
        "duration" | "days" | "durationdays" => Some(Column::Duration),
        "progress" | "percentcomplete" | "complete" | "%complete" | "done" => Some(Column::Progress),
        "status" | "state" => Some(Column::Status),
        "predecessors" | "predecessor" | "dependson" | "dependencies" => Some(Column::Predecessors),
        "id" | "uid" | "uuid" => Some(Column::Id),
        "description" | "notes" | "note" | "details" => Some(Column::Description),
        _ => None,
    }
}

/// Parse one predecessor code: `<wbs>[TYPE][+/-lag]`, e.g. `1.2FS+2`,
/// `3SS`, `4SF-1`. Without a type code the link is finish-to-start, so
/// `1.1+2` is `1.1FS+2`.
pub fn parse_predecessor(code: &str) -> Option<(String, DependencyKind, i64)> {
    let code = code.trim();
    if code.is_empty() {
        return None;
    }

    // lag suffix: trailing digits preceded by a sign
    let (head, lag) = match code.rfind(['+', '-']) {
        Some(idx) => {
            let lag: i64 = code[idx..].parse().ok()?;
            (&code[..idx], lag)
        }
        None => (code, 0),
    };

    let split = head.len().saturating_sub(2);
    match head.get(split..).and_then(|k| k.parse::<DependencyKind>().ok()) {
        Some(kind) if split > 0 => Some((head[..split].to_string(), kind, lag)),
        _ if !head.is_empty() && head.parse::<DependencyKind>().is_err() => {
            Some((head.to_string(), DependencyKind::FinishToStart, lag))
        }
        _ => None,
    }
}

fn parse_progress(s: &str) -> Option<i64> {
    let value: f64 = s.trim().trim_end_matches('%').trim().parse().ok()?;
    // fractions such as 0.5 mean 50%
    let pct = if value > 0.0 && value <= 1.0 && s.contains('.') {
        value * 100.0
    } else {
        value
    };
    Some(pct.round().clamp(0.0, 100.0) as i64)
}

/// Parse delimited text into WBS rows.
///
/// Rows without a WBS id or title are skipped. Predecessor codes refer to WBS
/// ids and are resolved to item ids once every row is loaded; unresolved
/// codes are dropped with a warning. Returns `(rows, skipped_count)`.
pub fn read_csv(content: &str) -> Result<(Vec<WbsRow>, usize)> {
    let first_line = content.lines().next().unwrap_or("");
    let delimiter = detect_delimiter(first_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let col_map: Vec<Option<Column>> = headers
        .iter()
        .map(|h| header_to_col(&normalize_header(h)))
        .collect();

    let has = |c: Column| col_map.contains(&Some(c));
    if !has(Column::Wbs) || !has(Column::Title) {
        let found: Vec<&str> = headers.iter().collect();
        return Err(WbsError::Csv(format!(
            "CSV is missing required columns. Found headers: {found:?}. \
             Need columns for: WBS id, title."
        )));
    }

    let now = Utc::now();
    let mut rows: Vec<WbsRow> = Vec::new();
    // raw predecessor codes, resolved after all rows are loaded
    let mut pred_codes: Vec<Vec<String>> = Vec::new();
    let mut skipped = 0usize;

    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(row = i + 2, error = %e, "skipping CSV row");
                skipped += 1;
                continue;
            }
        };

        let mut fields: HashMap<Column, &str> = HashMap::new();
        for (col_idx, field) in record.iter().enumerate() {
            if let Some(Some(col)) = col_map.get(col_idx) {
                fields.insert(*col, field.trim());
            }
        }
        let get = |c: Column| fields.get(&c).copied().filter(|s| !s.is_empty());

        let (Some(wbs_id), Some(title)) = (get(Column::Wbs), get(Column::Title)) else {
            skipped += 1;
            continue;
        };

        let id = get(Column::Id)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut row = WbsRow::new(id, wbs_id, title);
        row.description = get(Column::Description).map(str::to_string);
        row.start_date = get(Column::Start).and_then(parse_date);
        row.end_date = get(Column::End).and_then(parse_date);
        row.duration = get(Column::Duration).and_then(|s| s.parse::<i64>().ok());
        row.progress = get(Column::Progress).and_then(parse_progress);
        row.status = get(Column::Status).and_then(Status::from_label);
        row.created_at = now;
        row.updated_at = now;

        if let Some(raw) = get(Column::Start).filter(|_| row.start_date.is_none()) {
            tracing::warn!(row = i + 2, value = raw, "unparseable start date ignored");
        }

        pred_codes.push(
            get(Column::Predecessors)
                .map(|s| s.split([',', ' ']).filter(|c| !c.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
        );
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(WbsError::Csv(if skipped > 0 {
            format!("No valid WBS rows found in CSV ({skipped} rows skipped)")
        } else {
            "CSV file is empty or has no data rows".to_string()
        }));
    }

    // Second pass: resolve WBS codes to item ids.
    let by_path: HashMap<String, String> = rows
        .iter()
        .map(|r| (r.wbs_id.clone(), r.id.clone()))
        .collect();

    for (row, codes) in rows.iter_mut().zip(pred_codes) {
        for code in codes {
            let resolved = parse_predecessor(&code)
                .and_then(|(path, kind, lag)| by_path.get(&path).map(|id| Predecessor::new(id.clone(), kind, lag)));
            match resolved {
                Some(link) if link.id != row.id => row.predecessors.push(link),
                Some(_) => tracing::warn!(wbs_id = %row.wbs_id, "self reference dropped"),
                None => tracing::warn!(wbs_id = %row.wbs_id, code = %code, "unresolved predecessor dropped"),
            }
        }
    }

    Ok((rows, skipped))
}

/// Import WBS rows from a CSV file.
pub fn import_csv(path: &Path) -> Result<(Vec<WbsRow>, usize)> {
    let content = std::fs::read_to_string(path).map_err(|e| WbsError::io(path, e))?;
    read_csv(&content)
}
