// Export - JSON and spreadsheet renderings of stored collections

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::str::FromStr;

use crate::core::timestamps::is_structured_timestamp;
use crate::core::{format_human, parse_timestamp, to_rfc3339};
use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{Collection, Document};

/// Byte-order mark so spreadsheet tools open the file as UTF-8.
const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(AppError::BadRequest(format!("Unsupported export format '{}'", other))),
        }
    }
}

/// One downloadable file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Text,
    Time,
    Flag,
}

#[derive(Debug, Clone)]
struct Column {
    header: String,
    /// Dotted path into the document, `id` for the document id
    path: String,
    kind: CellKind,
}

impl Column {
    fn new(header: &str, path: &str, kind: CellKind) -> Self {
        Self {
            header: header.to_string(),
            path: path.to_string(),
            kind,
        }
    }
}

fn fixed(layout: &[(&str, &str, CellKind)]) -> Vec<Column> {
    layout.iter().map(|(h, p, k)| Column::new(h, p, *k)).collect()
}

fn columns_for(collection: Collection, rows: &[Value]) -> Vec<Column> {
    use CellKind::*;
    match collection {
        Collection::Programs => fixed(&[
            ("ID", "id", Text),
            ("Type", "type", Text),
            ("Title", "title", Text),
            ("Date", "date", Text),
            ("End Date", "endDate", Text),
            ("Start", "start", Text),
            ("End", "end", Text),
            ("Room", "room", Text),
            ("Chairs", "chairs", Text),
            ("Keynote Speaker", "keynote.name", Text),
            ("Keynote Affiliation", "keynote.affiliation", Text),
            ("Conferences", "conferences", Text),
            ("Created At", "createdAt", Time),
            ("Updated At", "updatedAt", Time),
        ]),
        Collection::Users => fixed(&[
            ("ID", "id", Text),
            ("UID", "uid", Text),
            ("Email", "email", Text),
            ("Display Name", "displayName", Text),
            ("Email Verified", "emailVerified", Flag),
            ("Disabled", "disabled", Flag),
            ("Created At", "createdAt", Time),
            ("Last Login", "lastLoginAt", Time),
            ("Last Active", "lastActiveAt", Time),
        ]),
        Collection::UserProfiles => fixed(&[
            ("ID", "id", Text),
            ("UID", "uid", Text),
            ("Email", "email", Text),
            ("Display Name", "displayName", Text),
            ("First Name", "firstName", Text),
            ("Last Name", "lastName", Text),
            ("School", "school", Text),
            ("School Level", "schoolLevel", Text),
            ("Gender", "gender", Text),
            ("Location", "location", Text),
            ("Profile Complete", "isProfileComplete", Flag),
            ("Created At", "createdAt", Time),
            ("Updated At", "updatedAt", Time),
        ]),
        Collection::Ratings => fixed(&[
            ("ID", "id", Text),
            ("Presentation ID", "presentationId", Text),
            ("Conference Title", "conferenceTitle", Text),
            ("Presenter", "presenter", Text),
            ("Date", "date", Text),
            ("Start Time", "startTime", Text),
            ("User ID", "userId", Text),
            ("User Email", "userEmail", Text),
            ("Presenter Rating", "presenterRating", Text),
            ("Presentation Rating", "presentationRating", Text),
            ("Comment", "comment", Text),
            ("Rated At", "ratedAt", Time),
        ]),
        Collection::Notifications => fixed(&[
            ("ID", "id", Text),
            ("User ID", "userId", Text),
            ("Title", "title", Text),
            ("Message", "message", Text),
            ("Type", "type", Text),
            ("Read", "isRead", Flag),
            ("Priority", "priority", Text),
            ("Created At", "createdAt", Time),
        ]),
        Collection::KeynoteSpeakers => fixed(&[
            ("ID", "id", Text),
            ("Name", "name", Text),
            ("Title", "title", Text),
            ("Institution", "institution", Text),
            ("Biography", "biography", Text),
            ("Order", "order", Text),
            ("Created At", "createdAt", Time),
            ("Updated At", "updatedAt", Time),
        ]),
        _ => union_of_keys(rows),
    }
}

/// Every top-level key in first-seen order, `id` first.
fn union_of_keys(rows: &[Value]) -> Vec<Column> {
    let mut keys: Vec<String> = vec!["id".to_string()];
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
    }
    keys.into_iter()
        .map(|key| {
            let kind = if key.ends_with("At") || key == "timestamp" {
                CellKind::Time
            } else {
                CellKind::Text
            };
            Column {
                header: key.clone(),
                path: key,
                kind,
            }
        })
        .collect()
}

fn lookup<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(row, |value, segment| value.get(segment))
}

fn render_cell(value: Option<&Value>, kind: CellKind) -> String {
    let value = match value {
        None | Some(Value::Null) => return String::new(),
        Some(v) => v,
    };

    if kind == CellKind::Time || is_structured_timestamp(value) {
        if let Some(dt) = parse_timestamp(value) {
            return format_human(&dt);
        }
    }

    match value {
        Value::String(s) if kind == CellKind::Flag && (s == "true" || s == "false") => {
            if s == "true" { "Yes" } else { "No" }.to_string()
        }
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// RFC 4180 field quoting.
fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line<I: IntoIterator<Item = String>>(fields: I) -> String {
    fields
        .into_iter()
        .map(|f| quote_field(&f))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn export_filename(stem: &str, format: ExportFormat, at: &DateTime<Utc>) -> String {
    format!("{}_{}.{}", stem, at.format("%Y-%m-%d"), format.extension())
}

/// Documents as JSON rows carrying their id and the export time.
pub fn export_rows(docs: &[Document], at: &DateTime<Utc>) -> Vec<Value> {
    let exported_at = Value::String(to_rfc3339(at));
    docs.iter()
        .map(|doc| {
            let mut row = doc.to_json_with_id();
            if let Value::Object(map) = &mut row {
                map.insert("exportedAt".to_string(), exported_at.clone());
            }
            row
        })
        .collect()
}

pub fn render_json(rows: &[Value]) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

/// Spreadsheet rendering; an empty collection is rejected.
pub fn render_csv(collection: Collection, rows: &[Value]) -> AppResult<String> {
    if rows.is_empty() {
        return Err(AppError::BadRequest("No data to export".to_string()));
    }

    let columns = columns_for(collection, rows);
    let mut out = String::from(UTF8_BOM);
    out.push_str(&csv_line(columns.iter().map(|c| c.header.clone())));
    out.push_str("\r\n");
    for row in rows {
        out.push_str(&csv_line(
            columns.iter().map(|c| render_cell(lookup(row, &c.path), c.kind)),
        ));
        out.push_str("\r\n");
    }
    Ok(out)
}

pub fn export_collection(
    collection: Collection,
    docs: &[Document],
    format: ExportFormat,
    at: &DateTime<Utc>,
) -> AppResult<ExportFile> {
    let rows = export_rows(docs, at);
    let content = match format {
        ExportFormat::Json => render_json(&rows)?,
        ExportFormat::Csv => render_csv(collection, &rows)?,
    };
    Ok(ExportFile {
        filename: export_filename(collection.as_str(), format, at),
        content_type: format.content_type(),
        content,
    })
}

/// Full backup: one JSON file, or one spreadsheet per non-empty collection.
pub fn export_backup(
    collections: &[(Collection, Vec<Document>)],
    format: ExportFormat,
    at: &DateTime<Utc>,
) -> AppResult<Vec<ExportFile>> {
    match format {
        ExportFormat::Json => {
            let mut backup = Map::new();
            let mut counts = Map::new();
            let mut total = 0usize;
            for (collection, docs) in collections {
                let rows: Vec<Value> = docs.iter().map(Document::to_json_with_id).collect();
                counts.insert(collection.as_str().to_string(), json!(docs.len()));
                total += docs.len();
                backup.insert(collection.as_str().to_string(), Value::Array(rows));
            }
            backup.insert("exportedAt".to_string(), Value::String(to_rfc3339(at)));
            backup.insert(
                "exportMetadata".to_string(),
                json!({
                    "exportDate": to_rfc3339(at),
                    "totalDocuments": total,
                    "collections": counts,
                }),
            );
            Ok(vec![ExportFile {
                filename: export_filename("complete_database_backup", format, at),
                content_type: format.content_type(),
                content: serde_json::to_string_pretty(&Value::Object(backup))?,
            }])
        }
        ExportFormat::Csv => collections
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(collection, docs)| {
                let rows = export_rows(docs, at);
                Ok(ExportFile {
                    filename: export_filename(&format!("all_{}", collection.as_str()), format, at),
                    content_type: format.content_type(),
                    content: render_csv(*collection, &rows)?,
                })
            })
            .collect(),
    }
}
