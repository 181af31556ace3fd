//! Standings extractor.
//!
//! The column set and order of the points table change from season to
//! season, so every scrape rebuilds a [`ColumnMap`] from the header row
//! before reading any data rows.

use super::{collapse_whitespace, selector};
use crate::browser::{BrowserConfig, PageDriver};
use crate::error::ScrapeError;
use crate::models::{ColumnMap, PointsTable, StandingsRow};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

/// A league never has more teams than this
pub const MAX_TEAMS: usize = 10;

static LEADING_FLOAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").unwrap());

pub fn url_for(base_url: &str, year: u16) -> String {
    format!("{}/points-table/men/{}", base_url.trim_end_matches('/'), year)
}

/// Navigate to a season's standings and parse them
pub fn scrape(
    page: &dyn PageDriver,
    browser: &BrowserConfig,
    base_url: &str,
    year: u16,
    now: DateTime<Utc>,
) -> Result<PointsTable, ScrapeError> {
    let url = url_for(base_url, year);
    log::info!("Loading points table for {} from {}", year, url);

    page.navigate(&url)?;
    page.settle(browser.settle());
    page.wait_for_selector("table", browser.wait_timeout())?;

    let html = page.html()?;
    let rows = extract_table_rows(&html);
    log::debug!("Extracted {} table rows for {}", rows.len(), year);

    let (teams, table_structure) = parse_standings(&rows, year)?;
    log::info!("Parsed {} teams for {}", teams.len(), year);

    Ok(PointsTable {
        year,
        total_teams: teams.len(),
        teams,
        last_updated: now,
        table_structure,
    })
}

/// Every `table tr` as a list of cell texts, skipping rows with no cells
pub fn extract_table_rows(html: &str) -> Vec<Vec<String>> {
    let document = Html::parse_document(html);
    let row_sel = selector("table tr");

    document
        .select(&row_sel)
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// Locate the known header tokens in a header row
pub fn create_column_map(header: &[String]) -> ColumnMap {
    let find = |token: &str| header.iter().position(|h| h.trim().eq_ignore_ascii_case(token));

    let map = ColumnMap {
        position: find("POS"),
        team: find("TEAM"),
        played: find("P"),
        won: find("W"),
        lost: find("L"),
        no_result: find("NR"),
        nrr: find("NRR"),
        runs_for: find("FOR"),
        against: find("AGAINST"),
        points: find("PTS"),
        recent_form: find("RECENT FORM"),
    };
    log::debug!("Column mapping: {:?}", map);
    map
}

/// Turn raw table rows (header first) into validated standings
pub fn parse_standings(
    rows: &[Vec<String>],
    year: u16,
) -> Result<(Vec<StandingsRow>, ColumnMap), ScrapeError> {
    if rows.len() < 2 {
        return Err(ScrapeError::Structural(format!(
            "insufficient table data for {} ({} rows)",
            year,
            rows.len()
        )));
    }

    let column_map = create_column_map(&rows[0]);
    if column_map.team.is_none() || column_map.played.is_none() {
        return Err(ScrapeError::Structural(format!(
            "missing TEAM or P column in {} header: {:?}",
            year, rows[0]
        )));
    }

    let min_len = column_map.min_row_len();
    let mut teams = Vec::new();

    for (index, row) in rows.iter().enumerate().skip(1) {
        if teams.len() >= MAX_TEAMS {
            break;
        }
        if row.len() < min_len {
            continue;
        }
        match parse_team_row(row, &column_map, index) {
            Ok(team) => teams.push(team),
            Err(e) => log::warn!("{} at row {} of {}", e, index, year),
        }
    }

    Ok((teams, column_map))
}

/// Parse one data row; `row_index` doubles as the fallback position
pub fn parse_team_row(
    row: &[String],
    map: &ColumnMap,
    row_index: usize,
) -> Result<StandingsRow, ScrapeError> {
    let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(String::as_str).unwrap_or("");
    let count = |idx: Option<usize>| {
        parse_leading_int(cell(idx))
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };

    let team = cell(map.team).trim().to_string();
    let team_len = team.chars().count();
    if !(2..=5).contains(&team_len) {
        return Err(ScrapeError::ValidationRejected(format!(
            "invalid team name '{}'",
            team
        )));
    }

    let position = match count(map.position) {
        0 => row_index as u32,
        p => p,
    };

    Ok(StandingsRow {
        position,
        team,
        played: count(map.played),
        won: count(map.won),
        lost: count(map.lost),
        no_result: count(map.no_result),
        net_run_rate: parse_leading_float(cell(map.nrr)).unwrap_or(0.0),
        runs_for: cell(map.runs_for).to_string(),
        runs_against: cell(map.against).to_string(),
        points: count(map.points),
        recent_form: cell(map.recent_form).to_string(),
    })
}

/// Integer prefix of a string (`"14*"` → 14), `None` when there are no digits
pub fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|v| sign * v)
}

/// Float prefix of a string (`"+1.542"` → 1.542)
pub fn parse_leading_float(text: &str) -> Option<f64> {
    LEADING_FLOAT
        .find(text.trim())
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
