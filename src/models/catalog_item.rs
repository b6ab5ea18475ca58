use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, AppResult};

/// Number of billed actors kept per movie
pub const MAX_ACTORS: usize = 3;

/// Values some exporters write instead of leaving a field out
const PLACEHOLDERS: [&str; 2] = ["Unknown", "N/A"];

static TRAILING_YEAR: OnceLock<Regex> = OnceLock::new();

fn trailing_year() -> &'static Regex {
    TRAILING_YEAR.get_or_init(|| Regex::new(r"\s*\(\d{4}\)\s*$").unwrap())
}

/// Watch state derived from the source view count
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WatchStatus {
    Watched,
    Unwatched,
}

impl WatchStatus {
    fn from_view_count(view_count: f64) -> Self {
        if view_count > 0.0 {
            WatchStatus::Watched
        } else {
            WatchStatus::Unwatched
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "watched" => Some(WatchStatus::Watched),
            "unwatched" => Some(WatchStatus::Unwatched),
            _ => None,
        }
    }
}

/// Canonical movie record held in the catalog snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub title: String,
    pub year: Option<i32>,
    pub director: Option<String>,
    pub genres: Vec<String>,
    pub plot: String,
    pub actors: Vec<String>,
    pub rating: Option<f64>,
    pub status: WatchStatus,
    pub external_id: Option<String>,
}

impl CatalogItem {
    /// Creates an unwatched item with only a title set
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
            director: None,
            genres: Vec::new(),
            plot: String::new(),
            actors: Vec::new(),
            rating: None,
            status: WatchStatus::Unwatched,
            external_id: None,
        }
    }

    pub fn is_watched(&self) -> bool {
        self.status == WatchStatus::Watched
    }
}

/// Cleans a display title: collapses whitespace and strips trailing "(YYYY)" suffixes
///
/// Applying it twice yields the same string as applying it once.
pub fn clean_title(raw: &str) -> String {
    let mut title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    while trailing_year().is_match(&title) {
        title = trailing_year().replace(&title, "").into_owned();
    }
    title.trim().to_string()
}

/// Converts a source record into a `CatalogItem`
///
/// Field names differ between Plex exports, flat JSON dumps and previously
/// serialized items, so each field is looked up under several keys. Malformed
/// numbers become `None`. Only non-object records and records whose title is
/// empty after cleanup are rejected.
pub fn normalize(raw: &Value) -> AppResult<CatalogItem> {
    let record = raw
        .as_object()
        .ok_or_else(|| AppError::NormalizationSkipped("record is not an object".to_string()))?;

    let title = first(record, &["title", "Title", "name"])
        .and_then(Value::as_str)
        .map(clean_title)
        .unwrap_or_default();

    if title.is_empty() {
        return Err(AppError::NormalizationSkipped(
            "record has no usable title".to_string(),
        ));
    }

    let year = first(record, &["year", "Year"])
        .and_then(as_number)
        .filter(|y| y.fract() == 0.0 && *y >= i32::MIN as f64 && *y <= i32::MAX as f64)
        .map(|y| y as i32);

    let director = first(record, &["director", "Director", "directors"])
        .map(string_list)
        .and_then(|directors| directors.into_iter().next());

    let genres = first(record, &["genres", "genre", "Genre"])
        .map(string_list)
        .unwrap_or_default();

    let plot = first(record, &["plot", "Plot", "summary"])
        .and_then(Value::as_str)
        .filter(|p| !is_placeholder(p))
        .map(|p| p.trim().to_string())
        .unwrap_or_default();

    let mut actors = first(record, &["actors", "Actors", "Role", "roles"])
        .map(string_list)
        .unwrap_or_default();
    actors.truncate(MAX_ACTORS);

    let rating = first(record, &["rating", "Rating", "audienceRating"]).and_then(as_number);

    let status = match first(record, &["viewCount", "ViewCount", "view_count"]).and_then(as_number)
    {
        Some(view_count) => WatchStatus::from_view_count(view_count),
        None => first(record, &["status", "Status"])
            .and_then(Value::as_str)
            .and_then(WatchStatus::parse)
            .unwrap_or(WatchStatus::Unwatched),
    };

    let external_id = first(record, &["external_id", "ratingKey", "id"]).and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    Ok(CatalogItem {
        title,
        year,
        director,
        genres,
        plot,
        actors,
        rating,
        status,
        external_id,
    })
}

/// Returns the first present, non-null value among `keys`
fn first<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || PLACEHOLDERS.iter().any(|p| p.eq_ignore_ascii_case(value))
}

/// Reads a list of names from a comma string, a string array or a Plex tag array
fn string_list(value: &Value) -> Vec<String> {
    let names: Vec<String> = match value {
        Value::String(s) => s.split(',').map(|part| part.trim().to_string()).collect(),
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(tag) => tag
                    .get("tag")
                    .or_else(|| tag.get("name"))
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    names.into_iter().filter(|n| !is_placeholder(n)).collect()
}
