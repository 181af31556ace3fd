use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four kinds of data scraped from the tournament site
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DataKind {
    PointsTable,
    Matches,
    Teams,
    News,
}

impl DataKind {
    pub const ALL: [DataKind; 4] = [
        DataKind::PointsTable,
        DataKind::Matches,
        DataKind::Teams,
        DataKind::News,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::PointsTable => "points-table",
            DataKind::Matches => "matches",
            DataKind::Teams => "teams",
            DataKind::News => "news",
        }
    }

    /// Cache key for this kind, e.g. `points-table-2025` or `news`
    pub fn cache_key(&self, year: Option<u16>) -> String {
        match year {
            Some(y) => format!("{}-{}", self.as_str(), y),
            None => self.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandingsRow {
    pub position: u32,
    pub team: String,
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub no_result: u32,
    pub net_run_rate: f64,
    pub runs_for: String,
    pub runs_against: String,
    pub points: u32,
    pub recent_form: String,
}

/// Header positions found in a standings table. `None` means the header was
/// absent from this season's table.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMap {
    pub position: Option<usize>,
    pub team: Option<usize>,
    pub played: Option<usize>,
    pub won: Option<usize>,
    pub lost: Option<usize>,
    pub no_result: Option<usize>,
    pub nrr: Option<usize>,
    #[serde(rename = "for")]
    pub runs_for: Option<usize>,
    pub against: Option<usize>,
    pub points: Option<usize>,
    pub recent_form: Option<usize>,
}

impl ColumnMap {
    fn all(&self) -> [Option<usize>; 11] {
        [
            self.position,
            self.team,
            self.played,
            self.won,
            self.lost,
            self.no_result,
            self.nrr,
            self.runs_for,
            self.against,
            self.points,
            self.recent_form,
        ]
    }

    /// Minimum number of cells a data row needs to be parsed
    pub fn min_row_len(&self) -> usize {
        self.all().iter().flatten().max().map_or(0, |max| max + 1)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointsTable {
    pub year: u16,
    pub teams: Vec<StandingsRow>,
    pub total_teams: usize,
    pub last_updated: DateTime<Utc>,
    pub table_structure: ColumnMap,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: u32,
    pub description: String,
    pub extracted: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchList {
    pub year: u16,
    pub matches: Vec<MatchRecord>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamProfile {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub link: String,
    pub image: String,
    pub championships: String,
    pub total_titles: u32,
    pub is_champion: bool,
    pub extracted: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamsSnapshot {
    pub teams: Vec<TeamProfile>,
    pub total_teams: usize,
    pub champion_teams: usize,
    pub last_updated: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: u32,
    pub title: String,
    pub summary: String,
    pub link: String,
    pub image: String,
    pub published_date: String,
    pub category: String,
    pub extracted: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsFeed {
    pub articles: Vec<NewsArticle>,
    pub total_articles: usize,
    pub last_updated: DateTime<Utc>,
    pub source: String,
}

/// Recorded outcome of a scrape that failed before any good data existed
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeFailure {
    pub category: String,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys() {
        assert_eq!(DataKind::PointsTable.cache_key(Some(2025)), "points-table-2025");
        assert_eq!(DataKind::Teams.cache_key(Some(2019)), "teams-2019");
        assert_eq!(DataKind::News.cache_key(None), "news");
    }

    #[test]
    fn test_min_row_len() {
        let map = ColumnMap {
            team: Some(1),
            played: Some(2),
            recent_form: Some(10),
            ..Default::default()
        };
        assert_eq!(map.min_row_len(), 11);
        assert_eq!(ColumnMap::default().min_row_len(), 0);
    }

    #[test]
    fn test_standings_row_serializes_camel_case() {
        let row = StandingsRow {
            position: 1,
            team: "MI".into(),
            played: 14,
            won: 10,
            lost: 4,
            no_result: 0,
            net_run_rate: 1.542,
            runs_for: "1960/0".into(),
            runs_against: "1800/0".into(),
            points: 20,
            recent_form: "WWWLW".into(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["noResult"], 0);
        assert_eq!(json["netRunRate"], 1.542);
        assert_eq!(json["recentForm"], "WWWLW");
    }
}
