//! Formation catalog imported from the organisation's Excel recap.
//!
//! The workbook is kept on disk as uploaded and re-parsed on every read, so
//! the catalog always reflects the last file an admin sent. Parsing works on
//! a plain [`Cell`] grid; [`read_workbook`] is the only place that knows
//! about `calamine`.

use calamine::{Data, Reader};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::database::models::{FormationStatus, FormationType};

pub const CATALOG_FILE_NAME: &str = "RECAP_FORMATIONS_pour_site.xlsx";

const DEFAULT_DURATION: &str = "Non spécifié";
const DEFAULT_PRICE: &str = "Sur demande";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("File must be an Excel workbook (.xlsx or .xls)")]
    NotSpreadsheet,

    #[error("Unreadable Excel file: {0}")]
    Unreadable(String),

    #[error("Excel file contains no worksheet")]
    NoWorksheet,

    #[error("Excel file contains no usable data")]
    Empty,

    #[error("Invalid period '{0}', expected all, recent or a year")]
    InvalidPeriod(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Spreadsheet cell reduced to what the catalog cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Bool(bool),
}

impl Cell {
    fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Date(d) => Some(d.format("%d/%m/%Y").to_string()),
            Cell::Bool(b) => Some(b.to_string()),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => match from_excel_serial(dt.as_f64()) {
                Some(date) => Cell::Date(date),
                None => Cell::Number(dt.as_f64()),
            },
        }
    }
}

/// Price column keeps numbers as numbers and anything else as a label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CatalogPrice {
    Amount(f64),
    Label(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub formation_type: FormationType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: Option<String>,
    pub duration: String,
    pub price: CatalogPrice,
    pub status: FormationStatus,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    title: Option<usize>,
    start: Option<usize>,
    end: Option<usize>,
    description: Option<usize>,
    price: Option<usize>,
    duration: Option<usize>,
}

fn map_columns(headers: &[Cell]) -> ColumnMap {
    let mut map = ColumnMap::default();

    for (index, cell) in headers.iter().enumerate() {
        let Some(header) = cell.text() else { continue };
        let header = header.to_lowercase();
        let h = header.as_str();

        if h.contains("formation") || h == "titre" || h == "intitulé" {
            map.title = Some(index);
        } else if h.contains("date de début") || h.contains("début") || h == "date" {
            map.start = Some(index);
        } else if h.contains("date de fin") || h.contains("fin") {
            map.end = Some(index);
        } else if h.contains("description") || h == "contenu" {
            map.description = Some(index);
        } else if h.contains("tarif") || h.contains("prix") || h == "coût" || h == "montant" {
            map.price = Some(index);
        } else if h.contains("durée") || h.contains("horaires") || h == "heure" {
            map.duration = Some(index);
        }
    }

    if map.title.is_none() {
        map.title = headers
            .iter()
            .position(|cell| matches!(cell, Cell::Text(s) if !s.trim().is_empty()));
    }

    map
}

/// Classify a training from keywords in its title; first match wins.
pub fn classify(title: &str) -> FormationType {
    let t = title.to_lowercase();
    let has = |needle: &str| t.contains(needle);

    if has("psc1") || has("psc") {
        FormationType::Psc1
    } else if has("pse1") {
        FormationType::Pse1
    } else if has("pse2") {
        FormationType::Pse2
    } else if has("bnssa") {
        FormationType::Bnssa
    } else if has("ssa") {
        FormationType::Ssa
    } else if has("sst") {
        FormationType::Sst
    } else if has("bsb") {
        FormationType::Bsb
    } else if has("gqs") {
        FormationType::Gqs
    } else if has("formateur") {
        FormationType::Trainer
    } else if has("recyclage") || has("continue") {
        FormationType::Refresher
    } else if has("permis côtier") || has("permis cotier") {
        FormationType::BoatLicense
    } else {
        FormationType::Other
    }
}

fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

/// Day serial counted from 1899-12-30; the fraction is the time of day.
pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial <= 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let seconds = (serial * 86_400.0).round() as i64;
    excel_epoch().checked_add_signed(Duration::seconds(seconds))
}

/// `D/M/YYYY` with `/`, `-` or `.` separators; two-digit years pivot at 50.
fn parse_day_first(input: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = input.split(['/', '-', '.']).collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };

    fn digits(s: &str, min: usize, max: usize) -> bool {
        (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
    }
    if !(digits(day, 1, 2) && digits(month, 1, 2) && digits(year, 2, 4)) {
        return None;
    }
    let day: u32 = day.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += if year < 50 { 2000 } else { 1900 };
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_date_text(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Some(date) = parse_day_first(input) {
        return Some(date.and_time(NaiveTime::MIN));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

pub fn parse_date(cell: &Cell) -> Option<DateTime<Utc>> {
    let naive = match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => from_excel_serial(*n),
        Cell::Text(s) => parse_date_text(s),
        Cell::Empty | Cell::Bool(_) => None,
    }?;
    Some(naive.and_utc())
}

fn parse_price(cell: &Cell) -> CatalogPrice {
    match cell {
        Cell::Number(n) => CatalogPrice::Amount(*n),
        other => CatalogPrice::Label(other.text().unwrap_or_else(|| DEFAULT_PRICE.to_string())),
    }
}

/// Turn a sheet (header row first) into catalog entries.
pub fn parse_rows(rows: &[Vec<Cell>], now: DateTime<Utc>) -> Result<Vec<CatalogEntry>, ImportError> {
    let (headers, body) = rows.split_first().ok_or(ImportError::Empty)?;
    let columns = map_columns(headers);
    debug!(?columns, "catalog columns mapped");

    let title_column = columns.title.ok_or(ImportError::Empty)?;
    let cell = |row: &[Cell], column: Option<usize>| -> Cell {
        column.and_then(|c| row.get(c)).cloned().unwrap_or(Cell::Empty)
    };

    let mut entries = Vec::new();
    for row in body {
        let row = row.as_slice();
        let Some(title) = cell(row, Some(title_column)).text() else {
            continue;
        };

        let start_date = match columns.start {
            Some(_) => parse_date(&cell(row, columns.start)).unwrap_or_else(|| {
                warn!(title = %title, "invalid start date, using today");
                now
            }),
            None => now,
        };
        let end_date = parse_date(&cell(row, columns.end)).unwrap_or_else(|| start_date + Duration::days(1));

        entries.push(CatalogEntry {
            id: format!("formation-{}", entries.len()),
            formation_type: classify(&title),
            start_date,
            end_date,
            description: cell(row, columns.description).text(),
            duration: cell(row, columns.duration)
                .text()
                .unwrap_or_else(|| DEFAULT_DURATION.to_string()),
            price: parse_price(&cell(row, columns.price)),
            status: FormationStatus::Planned,
            title,
        });
    }

    Ok(entries)
}

/// Read the first worksheet of an `.xlsx`/`.xls` buffer into a cell grid.
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<Vec<Cell>>, ImportError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoWorksheet)?
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect())
}

pub fn parse_workbook(bytes: &[u8], now: DateTime<Utc>) -> Result<Vec<CatalogEntry>, ImportError> {
    let rows = read_workbook(bytes)?;
    parse_rows(&rows, now)
}

/// Accept by extension or by spreadsheet MIME type.
pub fn ensure_spreadsheet(file_name: Option<&str>, content_type: Option<&str>) -> Result<(), ImportError> {
    let by_name = file_name
        .map(|n| n.to_lowercase())
        .is_some_and(|n| n.ends_with(".xlsx") || n.ends_with(".xls"));
    let by_type = content_type.is_some_and(|t| t.contains("spreadsheetml") || t.contains("excel"));

    if by_name || by_type {
        Ok(())
    } else {
        Err(ImportError::NotSpreadsheet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogPeriod {
    #[default]
    All,
    /// Starting within the next three months.
    Recent,
    Year(i32),
}

impl FromStr for CatalogPeriod {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(CatalogPeriod::All),
            "recent" => Ok(CatalogPeriod::Recent),
            year if year.len() == 4 => year
                .parse()
                .map(CatalogPeriod::Year)
                .map_err(|_| ImportError::InvalidPeriod(s.to_string())),
            _ => Err(ImportError::InvalidPeriod(s.to_string())),
        }
    }
}

impl CatalogPeriod {
    pub fn matches(&self, entry: &CatalogEntry, now: DateTime<Utc>) -> bool {
        match self {
            CatalogPeriod::All => true,
            CatalogPeriod::Year(year) => chrono::Datelike::year(&entry.start_date) == *year,
            CatalogPeriod::Recent => {
                let horizon = now.checked_add_months(Months::new(3)).unwrap_or(now);
                entry.start_date >= now && entry.start_date <= horizon
            }
        }
    }
}

/// The uploaded workbook and the catalog parsed from it.
#[derive(Debug, Clone)]
pub struct FormationCatalog {
    path: PathBuf,
}

impl FormationCatalog {
    pub fn new(excel_dir: impl AsRef<Path>) -> Self {
        Self {
            path: excel_dir.as_ref().join(CATALOG_FILE_NAME),
        }
    }

    /// Where the last accepted workbook is stored.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse first, then replace the stored workbook. A file that does not
    /// parse never overwrites the previous one.
    pub async fn import(&self, bytes: &[u8]) -> Result<Vec<CatalogEntry>, ImportError> {
        let entries = parse_workbook(bytes, Utc::now())?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        Ok(entries)
    }

    /// Empty when nothing was imported yet.
    pub async fn list(
        &self,
        formation_type: Option<FormationType>,
        period: CatalogPeriod,
    ) -> Result<Vec<CatalogEntry>, ImportError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        Ok(parse_workbook(&bytes, now)?
            .into_iter()
            .filter(|entry| formation_type.map_or(true, |t| entry.formation_type == t))
            .filter(|entry| period.matches(entry, now))
            .collect())
    }
}
