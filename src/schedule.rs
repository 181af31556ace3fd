//! Derived match status and the score-line parser behind `/schedule`.
//!
//! Result descriptions look like
//! `Mumbai Indians won by 6 wickets MI 180/4 (19.2 OV) CSK 178/8 (20 OV)`
//! across every season, so one parser covers 2008 onwards.

use crate::models::{MatchList, MatchRecord};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

static ABANDONED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)abandoned|no result").unwrap());
static WON_BY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)won by").unwrap());
static WINNER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(.+?)\s+won\s+by").unwrap());
static TEAM_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z]{2,5})\s+(\d+(?:/\d+)?)\s*\(\s*([0-9.]+)\s*OV\s*\)").unwrap()
});
static TEAM_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{2,5}\b").unwrap());

/// Full franchise names, past and present, as they appear in results
const TEAM_NAMES: &[(&str, &str)] = &[
    ("mumbai indians", "MI"),
    ("chennai super kings", "CSK"),
    ("royal challengers bengaluru", "RCB"),
    ("royal challengers bangalore", "RCB"),
    ("kolkata knight riders", "KKR"),
    ("rajasthan royals", "RR"),
    ("delhi capitals", "DC"),
    ("delhi daredevils", "DD"),
    ("punjab kings", "PBKS"),
    ("kings xi punjab", "PBKS"),
    ("sunrisers hyderabad", "SRH"),
    ("gujarat titans", "GT"),
    ("lucknow super giants", "LSG"),
    ("deccan chargers", "DCH"),
];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Completed,
    Upcoming,
    Abandoned,
}

pub fn match_status(description: &str) -> MatchStatus {
    if ABANDONED.is_match(description) {
        MatchStatus::Abandoned
    } else if WON_BY.is_match(description) {
        MatchStatus::Completed
    } else {
        MatchStatus::Upcoming
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TeamScore {
    pub code: String,
    pub score: String,
    pub overs: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MatchSummary {
    pub team1: TeamScore,
    pub team2: TeamScore,
    pub result: String,
    pub status: MatchStatus,
    /// Winning team code, empty when it could not be determined
    pub winner: String,
}

/// Team codes, scores, overs and winner from a result description
pub fn parse_match_summary(description: &str) -> Option<MatchSummary> {
    let status = match_status(description);

    if status == MatchStatus::Abandoned {
        let codes = abandoned_codes(description);
        if codes.len() >= 2 {
            let result = if description.to_lowercase().contains("abandoned") {
                "Abandoned"
            } else {
                "No Result"
            };
            return Some(MatchSummary {
                team1: TeamScore::bare(&codes[0]),
                team2: TeamScore::bare(&codes[1]),
                result: result.to_string(),
                status,
                winner: String::new(),
            });
        }
    }

    let mut seen = HashSet::new();
    let teams: Vec<TeamScore> = TEAM_SCORE
        .captures_iter(description)
        .map(|c| TeamScore {
            code: c[1].to_string(),
            score: c[2].to_string(),
            overs: c[3].to_string(),
        })
        .filter(|t| seen.insert(t.code.clone()))
        .collect();

    if teams.len() < 2 {
        return None;
    }

    let winner = winner_code(description, &teams).unwrap_or_default();
    let mut teams = teams.into_iter();
    let (team1, team2) = (teams.next()?, teams.next()?);

    Some(MatchSummary {
        team1,
        team2,
        result: winner.clone(),
        status,
        winner,
    })
}

impl TeamScore {
    fn bare(code: &str) -> Self {
        Self {
            code: code.to_string(),
            score: String::new(),
            overs: String::new(),
        }
    }
}

/// Upper-case codes not immediately followed by an overs marker
fn abandoned_codes(description: &str) -> Vec<String> {
    TEAM_CODE
        .find_iter(description)
        .filter(|m| m.as_str() != "OV" && !description[m.end()..].trim_start().starts_with("OV"))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn winner_code(description: &str, teams: &[TeamScore]) -> Option<String> {
    let name = WINNER.captures(description)?.get(1)?.as_str().trim().to_lowercase();

    TEAM_NAMES
        .iter()
        .find(|(full, _)| *full == name)
        .map(|(_, code)| code.to_string())
        .or_else(|| {
            teams
                .iter()
                .find(|t| name.contains(&t.code.to_lowercase()))
                .map(|t| t.code.clone())
        })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMatch {
    #[serde(flatten)]
    pub record: MatchRecord,
    pub status: MatchStatus,
    pub summary: Option<MatchSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub year: u16,
    pub total_matches: usize,
    pub matches: Vec<ScheduledMatch>,
    pub last_updated: DateTime<Utc>,
    pub upcoming_matches: usize,
    pub completed_matches: usize,
    pub abandoned_matches: usize,
}

pub fn build_schedule(list: &MatchList) -> ScheduleSummary {
    let matches: Vec<ScheduledMatch> = list
        .matches
        .iter()
        .map(|record| ScheduledMatch {
            status: match_status(&record.description),
            summary: parse_match_summary(&record.description),
            record: record.clone(),
        })
        .collect();

    let count = |status: MatchStatus| matches.iter().filter(|m| m.status == status).count();

    ScheduleSummary {
        year: list.year,
        total_matches: matches.len(),
        upcoming_matches: count(MatchStatus::Upcoming),
        completed_matches: count(MatchStatus::Completed),
        abandoned_matches: count(MatchStatus::Abandoned),
        matches,
        last_updated: list.last_updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_match_with_named_winner() {
        let desc = "Mumbai Indians won by 6 wickets MI 180/4 (19.2 OV) CSK 178/8 (20 OV)";
        assert_eq!(match_status(desc), MatchStatus::Completed);

        let summary = parse_match_summary(desc).unwrap();
        assert_eq!(summary.winner, "MI");
        assert_eq!(summary.team1.code, "MI");
        assert_eq!(summary.team1.score, "180/4");
        assert_eq!(summary.team1.overs, "19.2");
        assert_eq!(summary.team2.code, "CSK");
        assert_eq!(summary.team2.overs, "20");
    }

    #[test]
    fn test_card_text_with_line_breaks() {
        let desc = "Mumbai Indians won by 6 wickets\n  MI 180/4 (19.2 OV)\n  CSK 178/8 (20 OV)";
        let summary = parse_match_summary(desc).unwrap();
        assert_eq!(summary.winner, "MI");
        assert_eq!(summary.team2.code, "CSK");
        assert_eq!(summary.team2.score, "178/8");
    }

    #[test]
    fn test_status_precedence() {
        assert_eq!(
            match_status("Match Abandoned, RCB won by nothing"),
            MatchStatus::Abandoned
        );
        assert_eq!(match_status("NO RESULT due to rain"), MatchStatus::Abandoned);
        assert_eq!(match_status("MI vs CSK, 7:30 PM"), MatchStatus::Upcoming);
        assert_eq!(match_status("csk WON BY 10 runs"), MatchStatus::Completed);
    }

    #[test]
    fn test_legacy_names_and_code_fallback() {
        let desc = "Deccan Chargers won by 6 runs DCH 143/6 (20 OV) RCB 137/9 (20 OV)";
        assert_eq!(parse_match_summary(desc).unwrap().winner, "DCH");

        // Delhi keeps its own code
        let desc = "Delhi Capitals won by 4 wickets PBKS 160/7 (20 OV) DC 161/6 (19.3 OV)";
        assert_eq!(parse_match_summary(desc).unwrap().winner, "DC");

        let desc = "Team KKR won by 7 wickets SRH 150/8 (20 OV) KKR 151/3 (18.1 OV)";
        assert_eq!(parse_match_summary(desc).unwrap().winner, "KKR");
    }

    #[test]
    fn test_repeated_team_codes_collapse() {
        let desc = "Gujarat Titans won by 5 wickets GT 150/5 (19 OV) GT 150/5 (19 OV) RR 148 (20 OV)";
        let summary = parse_match_summary(desc).unwrap();
        assert_eq!(summary.team2.code, "RR");
        assert_eq!(summary.team2.score, "148");
    }

    #[test]
    fn test_abandoned_summary() {
        let summary = parse_match_summary("Match Abandoned RCB KKR").unwrap();
        assert_eq!(summary.status, MatchStatus::Abandoned);
        assert_eq!(summary.result, "Abandoned");
        assert_eq!(summary.team1.code, "RCB");
        assert_eq!(summary.team2.code, "KKR");
        assert!(summary.winner.is_empty());
    }

    #[test]
    fn test_unparseable_description() {
        assert!(parse_match_summary("Fixtures to be announced").is_none());
    }

    #[test]
    fn test_build_schedule_counts() {
        let now = Utc::now();
        let list = MatchList {
            year: 2025,
            matches: crate::extractors::matches::build_records(
                vec![
                    "Mumbai Indians won by 6 wickets MI 180/4 (19.2 OV) CSK 178/8 (20 OV)".into(),
                    "Match Abandoned RCB KKR".into(),
                    "GT vs LSG".into(),
                    "PBKS vs DC".into(),
                ],
                now,
            ),
            last_updated: now,
        };
        let schedule = build_schedule(&list);
        assert_eq!(schedule.total_matches, 4);
        assert_eq!(schedule.completed_matches, 1);
        assert_eq!(schedule.abandoned_matches, 1);
        assert_eq!(schedule.upcoming_matches, 2);

        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(json["matches"][0]["status"], "completed");
        assert_eq!(json["matches"][0]["id"], 1);
    }
}
