use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use feedscout_types::{Column, Rect};
use serde::Serialize;
use thiserror::Error;
use tokio::fs;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to write record {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode record: {0}")]
    Json(#[from] serde_json::Error),
}

/// What was read from an opened item.
#[derive(Debug, Clone, Serialize)]
pub struct CollectedPost {
    pub title: String,
    pub content: String,
    pub keywords_matched: Vec<String>,
    pub signature: String,
    pub column: Option<Column>,
    pub rect: Option<Rect>,
    pub published_at: Option<String>,
    pub scraped_at: String,
}

impl CollectedPost {
    pub fn primary_keyword(&self) -> &str {
        self.keywords_matched
            .first()
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

/// Writes one pretty JSON file per collected post.
#[derive(Debug, Clone)]
pub struct RecordWriter {
    directory: PathBuf,
}

impl RecordWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes `{keyword}_{timestamp}.json`, adding a counter when a record
    /// with that name already exists.
    pub async fn write(&self, post: &CollectedPost) -> Result<PathBuf, RecordError> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| RecordError::Io {
                path: self.directory.clone(),
                source,
            })?;

        let stem = format!(
            "{}_{}",
            sanitize_file_component(post.primary_keyword()),
            Local::now().format(FILE_STAMP_FORMAT)
        );
        let mut path = self.directory.join(format!("{stem}.json"));
        let mut counter = 1;
        while fs::try_exists(&path).await.unwrap_or(false) {
            path = self.directory.join(format!("{stem}_{counter}.json"));
            counter += 1;
        }

        let encoded = serde_json::to_vec_pretty(post)?;
        fs::write(&path, encoded)
            .await
            .map_err(|source| RecordError::Io {
                path: path.clone(),
                source,
            })?;
        log::info!("saved post to {}", path.display());
        Ok(path)
    }
}

fn sanitize_file_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_whitespace() => '_',
            ch => ch,
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

/// Resolves the relative and partial timestamps feed items display into
/// `YYYY-MM-DD HH:MM:SS`, relative to `now`. Returns `None` for text that
/// holds no recognizable time.
pub fn parse_time(text: &str, now: NaiveDateTime) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let midnight = NaiveTime::MIN;

    if let Some(minutes) = leading_number_before(text, "分钟前") {
        return Some(format_timestamp(now - Duration::minutes(minutes)));
    }
    if let Some(hours) = leading_number_before(text, "小时前") {
        return Some(format_timestamp(now - Duration::hours(hours)));
    }
    if let Some(rest) = text.find("昨天").map(|idx| &text[idx + "昨天".len()..]) {
        let yesterday = now.date() - Duration::days(1);
        let time = find_clock(rest).unwrap_or(midnight);
        return Some(format_timestamp(yesterday.and_time(time)));
    }
    if let Some(date) = find_ymd(text) {
        let time = find_clock(text).unwrap_or(midnight);
        return Some(format_timestamp(date.and_time(time)));
    }
    if let Some((month, day)) = find_month_day(text) {
        let this_year = NaiveDate::from_ymd_opt(now.year(), month, day)?;
        let date = if this_year > now.date() {
            NaiveDate::from_ymd_opt(now.year() - 1, month, day)?
        } else {
            this_year
        };
        return Some(format_timestamp(date.and_hms_opt(0, 0, 0)?));
    }
    if let Some(time) = find_clock(text) {
        return Some(format_timestamp(now.date().and_time(time)));
    }
    None
}

fn leading_number_before(text: &str, suffix: &str) -> Option<i64> {
    let idx = text.find(suffix)?;
    let digits: String = text[..idx]
        .trim_end()
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

/// Digit runs of `text` with the single separator character that follows
/// each run, if any.
fn digit_groups(text: &str) -> Vec<(u32, Option<char>)> {
    let chars: Vec<char> = text.chars().collect();
    let mut groups = Vec::new();
    let mut idx = 0;
    while idx < chars.len() {
        if !chars[idx].is_ascii_digit() {
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < chars.len() && chars[idx].is_ascii_digit() {
            idx += 1;
        }
        let digits: String = chars[start..idx].iter().collect();
        if let Ok(value) = digits.parse::<u32>() {
            groups.push((value, chars.get(idx).copied()));
        }
    }
    groups
}

fn find_ymd(text: &str) -> Option<NaiveDate> {
    let groups = digit_groups(text);
    groups.windows(3).find_map(|w| {
        let [(year, Some(s1)), (month, Some(s2)), (day, _)] = w else {
            return None;
        };
        let separated = matches!(s1, '-' | '/' | '.' | '年') && matches!(s2, '-' | '/' | '.' | '月');
        (separated && *year >= 1000)
            .then(|| NaiveDate::from_ymd_opt(*year as i32, *month, *day))
            .flatten()
    })
}

fn find_month_day(text: &str) -> Option<(u32, u32)> {
    let groups = digit_groups(text);
    groups.windows(2).find_map(|w| {
        let [(month, Some(sep)), (day, _)] = w else {
            return None;
        };
        let separated = matches!(sep, '-' | '/' | ' ' | '月');
        ((1..=12).contains(month) && (1..=31).contains(day) && separated)
            .then_some((*month, *day))
    })
}

fn find_clock(text: &str) -> Option<NaiveTime> {
    let groups = digit_groups(text);
    groups.windows(2).find_map(|w| {
        let [(hour, Some(':')), (minute, _)] = w else {
            return None;
        };
        NaiveTime::from_hms_opt(*hour, *minute, 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    #[test]
    fn relative_offsets() {
        let now = at(2026, 2, 2, 12, 0);
        assert_eq!(parse_time("15分钟前", now).unwrap(), "2026-02-02 11:45:00");
        assert_eq!(parse_time("2小时前", now).unwrap(), "2026-02-02 10:00:00");
        assert_eq!(parse_time("昨天 18:30", now).unwrap(), "2026-02-01 18:30:00");
        assert_eq!(parse_time("昨天", now).unwrap(), "2026-02-01 00:00:00");
    }

    #[test]
    fn absolute_and_partial_dates() {
        let now = at(2026, 2, 2, 12, 0);
        assert_eq!(parse_time("2026-01-22", now).unwrap(), "2026-01-22 00:00:00");
        assert_eq!(parse_time("01-22", now).unwrap(), "2026-01-22 00:00:00");
        assert_eq!(parse_time("01 22", now).unwrap(), "2026-01-22 00:00:00");
        assert_eq!(parse_time("23:59", now).unwrap(), "2026-02-02 23:59:00");
    }

    #[test]
    fn future_month_day_rolls_back_a_year() {
        let now = at(2026, 1, 1, 0, 10);
        assert_eq!(parse_time("12-31", now).unwrap(), "2025-12-31 00:00:00");
    }

    #[test]
    fn text_without_time_is_rejected() {
        let now = at(2026, 2, 2, 12, 0);
        assert_eq!(parse_time("大模型", now), None);
        assert_eq!(parse_time("13-40", now), None);
        assert_eq!(parse_time("", now), None);
    }

    #[tokio::test]
    async fn writer_names_files_after_the_first_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RecordWriter::new(dir.path().join("out"));
        let post = CollectedPost {
            title: "美团 大模型".into(),
            content: "正文".into(),
            keywords_matched: vec!["大模型".into(), "AI".into()],
            signature: "abc".into(),
            column: Some(Column::Left),
            rect: Some(Rect::new(0, 0, 10, 10)),
            published_at: None,
            scraped_at: format_timestamp(at(2026, 2, 2, 12, 0)),
        };
        let first = writer.write(&post).await.unwrap();
        let second = writer.write(&post).await.unwrap();
        assert_ne!(first, second);

        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("大模型_") && name.ends_with(".json"));
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&first).unwrap()).unwrap();
        assert_eq!(value["keywords_matched"][1], "AI");
        assert_eq!(value["column"], "left");
    }
}
