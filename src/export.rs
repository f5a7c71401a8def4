//! Output and input files: column maps per listing, CSV (UTF-8 with BOM), XLSX and pretty
//! JSON writers, and loading comic lists back from any of them.

use crate::model::{is_truthy, Comic, PageType};
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet};
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Field key → column header, in output order.
pub type Columns = Vec<(&'static str, &'static str)>;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Keys dropped from JSON output; they are large nested objects nobody reads.
const BULKY_KEYS: [&str; 9] = [
    "ep_list",
    "styles2",
    "fav_comic_info",
    "series_info",
    "story_elems",
    "discount_marketing",
    "data_info",
    "coupon_marketing",
    "discount_banner",
];

const BONUS_COLUMNS: [&str; 5] = [
    "bonus_total",
    "last_bonus_title",
    "last_bonus_date",
    "recently_lock_bonus_title",
    "recently_lock_bonus_date",
];

const FULL: [(&str, &str); 21] = [
    ("comic_id", "ID"),
    ("title", "漫画名"),
    ("authors", "作者"),
    ("info", "更新信息"),
    ("is_finish", "状态"),
    ("total", "章节数"),
    ("bonus_total", "特典数"),
    ("last_ep_title", "最新章节标题"),
    ("last_ep_date", "最新章节更新日期"),
    ("last_bonus_title", "最新特典标题"),
    ("last_bonus_date", "最新特典日期"),
    ("recently_lock_bonus_title", "最近下架特典标题"),
    ("recently_lock_bonus_date", "最近下架特典日期"),
    ("renewal_time", "更新规则"),
    ("introduction", "简介"),
    ("styles", "风格"),
    ("tags", "标签"),
    ("horizontal_covers", "横版封面"),
    ("vertical_cover", "竖版封面"),
    ("square_cover", "方形封面"),
    ("release_time", "上架时间"),
];

const CLASSIFY: [(&str, &str); 13] = [
    ("comic_id", "ID"),
    ("title", "漫画名"),
    ("authors", "作者"),
    ("info", "更新信息"),
    ("is_finish", "状态"),
    ("total", "章节数"),
    ("introduction", "简介"),
    ("styles", "风格"),
    ("rd_tag", "标签"),
    ("horizontal_covers", "横版封面"),
    ("vertical_cover", "竖版封面"),
    ("square_cover", "方形封面"),
    ("release_time", "上架时间"),
];

const UPDATE: [(&str, &str); 11] = [
    ("comic_id", "ID"),
    ("title", "漫画名"),
    ("ep_id", "最新章节ID"),
    ("ep_title", "最新章节名"),
    ("short_title", "最新章节短名"),
    ("comment_total", "评论数"),
    ("allow_wait_free", "等免"),
    ("styles", "风格"),
    ("url", "横版封面"),
    ("vertical_cover", "竖版封面"),
    ("date", "更新日期"),
];

const RANKING: [(&str, &str); 13] = [
    ("comic_id", "ID"),
    ("title", "漫画名"),
    ("rank", "本周排行"),
    ("last_rank", "上周排行"),
    ("authors", "作者"),
    ("info", "更新信息"),
    ("is_finish", "状态"),
    ("last_short_title", "最新章节短标题"),
    ("total", "章节数"),
    ("fans", "追更人数"),
    ("styles", "风格"),
    ("tags", "标签"),
    ("vertical_cover", "竖版封面"),
];

const HOME_FEED: [(&str, &str); 9] = [
    ("comic_id", "ID"),
    ("title", "漫画名"),
    ("image", "封面"),
    ("is_finish", "状态"),
    ("lastest_short_title", "最新章节短标题"),
    ("main_style_name", "风格"),
    ("score", "评分"),
    ("introduction", "简介"),
    ("evaluate", "剧情梗概"),
];

const FAVORITE: [(&str, &str); 12] = [
    ("comic_id", "ID"),
    ("title", "漫画名"),
    ("authors", "作者"),
    ("info", "更新信息"),
    ("is_finish", "状态"),
    ("total", "章节数"),
    ("last_ep_title", "最新章节短标题"),
    ("last_ep_date", "最新章节更新日期"),
    ("hcover", "横版封面"),
    ("vcover", "竖版封面"),
    ("scover", "方形封面"),
    ("latest_read_time", "上次阅读时间"),
];

const BUY: [(&str, &str); 9] = [
    ("comic_id", "ID"),
    ("title", "漫画名"),
    ("total", "章节数"),
    ("bought_ep_count", "已购章节数"),
    ("last_ep_title", "最新章节短标题"),
    ("last_ep_date", "最新章节更新日期"),
    ("hcover", "横版封面"),
    ("vcover", "竖版封面"),
    ("scover", "方形封面"),
];

/// Output file format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    Xlsx,
}

impl OutputFormat {
    /// `.csv` and `.xlsx` pick their own writers. Anything else is written as JSON.
    pub fn for_output(path: &Path) -> Self {
        match extension(path).as_str() {
            "csv" => OutputFormat::Csv,
            "xlsx" => OutputFormat::Xlsx,
            _ => OutputFormat::Json,
        }
    }

    /// Input files must be `.json`, `.csv` or `.xlsx`.
    pub fn for_input(path: &Path) -> Result<Self, ExportError> {
        match extension(path).as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "xlsx" => Ok(OutputFormat::Xlsx),
            _ => Err(ExportError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Errors while reading or writing comic lists.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write spreadsheet {path}: {source}")]
    XlsxWrite {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("Invalid spreadsheet {path}: {source}")]
    XlsxRead {
        path: PathBuf,
        #[source]
        source: calamine::XlsxError,
    },

    #[error("Unsupported file type: {path}. Use .json, .csv or .xlsx.")]
    UnsupportedFormat { path: PathBuf },

    #[error("{path} has no ID column")]
    MissingIdColumn { path: PathBuf },
}

/// Columns for a result set. Detail runs use the full set (minus bonus columns unless
/// bonus data was attached); listing-only runs use the listing's own columns.
pub fn columns_for(page: Option<PageType>, detail: bool, bonus: bool) -> Columns {
    if detail && bonus {
        return FULL.to_vec();
    }
    if detail {
        return FULL
            .iter()
            .filter(|(key, _)| !BONUS_COLUMNS.contains(key))
            .copied()
            .collect();
    }
    match page {
        Some(PageType::Classify) => CLASSIFY.to_vec(),
        Some(PageType::Update) => UPDATE.to_vec(),
        Some(PageType::Ranking) => RANKING.to_vec(),
        Some(PageType::HomeFeed) => HOME_FEED.to_vec(),
        Some(PageType::Favorite) => FAVORITE.to_vec(),
        Some(PageType::Buy) => BUY.to_vec(),
        None => FULL.to_vec(),
    }
}

/// Cell text for `field` of `row`.
pub fn map_field(field: &str, row: &Comic) -> String {
    let value = row.get(field).unwrap_or(&Value::Null);
    match field {
        "is_finish" => match value.as_i64() {
            Some(0) => "连载中".to_string(),
            Some(1) => "已完结".to_string(),
            _ => cell_text(value),
        },
        "info" if !is_truthy(value) => {
            let total = row.get("total").unwrap_or(&Value::Null);
            if !is_truthy(total) {
                String::new()
            } else if row.get("is_finish").map(is_truthy).unwrap_or(false) {
                format!("[已完结]共{}话", cell_text(total))
            } else {
                format!("[连载中]至{}话", cell_text(total))
            }
        }
        "authors" => {
            let named = value
                .as_array()
                .and_then(|a| a.first())
                .map(Value::is_object)
                .unwrap_or(false);
            if named {
                join_names(value)
            } else if let Some(alt) = ["author_name", "author"]
                .iter()
                .filter_map(|k| row.get(*k))
                .find(|v| is_truthy(v))
            {
                join_names(alt)
            } else {
                join_names(value)
            }
        }
        "styles" | "tags" => join_names(value),
        "horizontal_covers" => match row.get("horizontal_cover") {
            Some(single) if !is_truthy(value) && is_truthy(single) => cell_text(single),
            _ => join_names(value),
        },
        "allow_wait_free" => String::from(if is_truthy(value) { "是" } else { "否" }),
        _ => cell_text(value),
    }
}

/// Lists of strings or `{"name": ..}` objects joined with commas.
fn join_names(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(o) => o.get("name").map(cell_text).unwrap_or_default(),
                other => cell_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        other => cell_text(other),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write `comics` to `path` in the format its extension names.
pub fn save(path: &Path, comics: &[Comic], columns: &Columns) -> Result<(), ExportError> {
    match OutputFormat::for_output(path) {
        OutputFormat::Csv => write_csv(path, comics, columns),
        OutputFormat::Xlsx => write_xlsx(path, comics, columns),
        OutputFormat::Json => write_json(path, comics),
    }?;
    tracing::info!(path = %path.display(), count = comics.len(), "saved");
    Ok(())
}

/// Pretty JSON (4-space indent, non-ASCII kept) with bulky nested keys removed.
pub fn write_json(path: &Path, comics: &[Comic]) -> Result<(), ExportError> {
    let slim: Vec<Comic> = comics
        .iter()
        .map(|c| {
            let mut c = c.clone();
            for key in BULKY_KEYS {
                c.remove(key);
            }
            c
        })
        .collect();
    let file = create(path)?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    slim.serialize(&mut ser).map_err(|e| ExportError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    writer.flush().map_err(|e| io_error(path, e))
}

/// CSV with a UTF-8 BOM so spreadsheet programs pick the right encoding.
pub fn write_csv(path: &Path, comics: &[Comic], columns: &Columns) -> Result<(), ExportError> {
    let mut file = create(path)?;
    file.write_all(UTF8_BOM).map_err(|e| io_error(path, e))?;
    let csv_error = |e| ExportError::Csv {
        path: path.to_path_buf(),
        source: e,
    };
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    writer
        .write_record(columns.iter().map(|(_, header)| *header))
        .map_err(csv_error)?;
    for comic in comics {
        writer
            .write_record(columns.iter().map(|(key, _)| map_field(key, comic)))
            .map_err(csv_error)?;
    }
    writer.flush().map_err(|e| io_error(path, e))
}

/// Workbook with one sheet: a bold centered header row under an auto-filter, columns sized
/// from their header text, then one row per comic.
pub fn write_xlsx(path: &Path, comics: &[Comic], columns: &Columns) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    fill_sheet(workbook.add_worksheet(), comics, columns)
        .and_then(|_| workbook.save(path))
        .map_err(|e| ExportError::XlsxWrite {
            path: path.to_path_buf(),
            source: e,
        })
}

fn fill_sheet(
    sheet: &mut Worksheet,
    comics: &[Comic],
    columns: &Columns,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    let header_format = Format::new().set_bold().set_align(FormatAlign::Center);
    for (col, (_, header)) in (0u16..).zip(columns.iter()) {
        sheet.write_string_with_format(0, col, *header, &header_format)?;
        sheet.set_column_width(col, (header.chars().count() * 2 + 5) as f64)?;
    }
    if let Some(last_col) = (columns.len() as u16).checked_sub(1) {
        sheet.autofilter(0, 0, 0, last_col)?;
    }
    for (row, comic) in (1u32..).zip(comics) {
        for (col, (key, _)) in (0u16..).zip(columns.iter()) {
            let text = map_field(key, comic);
            match comic.get(*key) {
                // Unmapped numbers are written as numbers.
                Some(Value::Number(n)) if text == n.to_string() => {
                    sheet.write_number(row, col, n.as_f64().unwrap_or_default())?;
                }
                _ if text.is_empty() => {}
                _ => {
                    sheet.write_string(row, col, text)?;
                }
            }
        }
    }
    Ok(())
}

/// Read a comic list from `.json` (array of objects), `.csv` or `.xlsx`. Tables use their
/// header row as keys and copy the `ID` column to `comic_id`.
pub fn load(path: &Path) -> Result<Vec<Comic>, ExportError> {
    match OutputFormat::for_input(path)? {
        OutputFormat::Json => {
            serde_json::from_str(&read_text(path)?).map_err(|e| ExportError::Json {
                path: path.to_path_buf(),
                source: e,
            })
        }
        OutputFormat::Csv => parse_csv(&read_text(path)?, path),
        OutputFormat::Xlsx => read_xlsx(path),
    }
}

fn read_text(path: &Path) -> Result<String, ExportError> {
    let text = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// First sheet only.
fn read_xlsx(path: &Path) -> Result<Vec<Comic>, ExportError> {
    let xlsx_error = |e| ExportError::XlsxRead {
        path: path.to_path_buf(),
        source: e,
    };
    let missing_id = || ExportError::MissingIdColumn {
        path: path.to_path_buf(),
    };
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(xlsx_error)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(xlsx_error)?,
        None => return Err(missing_id()),
    };
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_text(&sheet_value(cell)))
            .collect(),
        None => return Err(missing_id()),
    };
    if !headers.iter().any(|h| h == "ID") {
        return Err(missing_id());
    }
    let comics = rows
        .map(|cells| {
            let mut comic: Comic = headers
                .iter()
                .zip(cells)
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, cell)| (h.clone(), sheet_value(cell)))
                .collect();
            if let Some(id) = comic.get("ID").cloned() {
                comic.insert("comic_id".to_string(), id);
            }
            comic
        })
        .collect();
    Ok(comics)
}

/// Whole-valued floats come back as integers.
fn sheet_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(*f as i64),
        Data::Float(f) => Value::from(*f),
        other => Value::String(other.to_string()),
    }
}

fn parse_csv(text: &str, path: &Path) -> Result<Vec<Comic>, ExportError> {
    let csv_error = |e| ExportError::Csv {
        path: path.to_path_buf(),
        source: e,
    };
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers().map_err(csv_error)?.clone();
    if !headers.iter().any(|h| h == "ID") {
        return Err(ExportError::MissingIdColumn {
            path: path.to_path_buf(),
        });
    }
    let mut comics = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let mut comic: Comic = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        if let Some(id) = comic.get("ID").cloned() {
            comic.insert("comic_id".to_string(), id);
        }
        comics.push(comic);
    }
    Ok(comics)
}

fn create(path: &Path) -> Result<File, ExportError> {
    File::create(path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}
