//! Franchise extractor.
//!
//! Championship years are not linked to their team in the markup; they
//! sit in hover cards laid out next to each team link. The only reliable
//! association is geometric, so a probe script runs in the page, records
//! every team anchor with the logos and trophy texts found in its first
//! few ancestors together with their on-screen positions, and the
//! matching is done here on the returned [`AnchorProbe`]s.

use super::{absolute_url, collapse_whitespace, selector};
use crate::browser::{BrowserConfig, PageDriver};
use crate::error::ScrapeError;
use crate::models::{TeamProfile, TeamsSnapshot};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const ANCESTOR_LEVELS: usize = 5;
pub const MAX_TROPHY_DISTANCE: f64 = 200.0;
pub const SOURCE: &str = "iplt20.com";

static SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)/teams/([a-z\-]+)").unwrap());
static CLEAN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z\s]+?)(?:\s+\d+|\s*$)").unwrap());
static TROPHY_YEARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}(\s*\|\s*\d{4})*$").unwrap());

/// Current franchises and their official abbreviations
const FRANCHISES: &[(&str, &str)] = &[
    ("chennai-super-kings", "CSK"),
    ("delhi-capitals", "DC"),
    ("gujarat-titans", "GT"),
    ("kolkata-knight-riders", "KKR"),
    ("lucknow-super-giants", "LSG"),
    ("mumbai-indians", "MI"),
    ("punjab-kings", "PBKS"),
    ("rajasthan-royals", "RR"),
    ("royal-challengers-bengaluru", "RCB"),
    ("sunrisers-hyderabad", "SRH"),
];

/// Runs in the page and returns the anchors as a JSON string
pub const PROBE_SCRIPT: &str = r#"
(() => {
    const levels = 5;
    const anchors = [];
    document.querySelectorAll('a[href*="/teams/"]').forEach(link => {
        const linkRect = link.getBoundingClientRect();
        const ancestors = [];
        let node = link;
        for (let level = 0; level < levels; level++) {
            node = node.parentElement;
            if (!node) break;
            const images = Array.from(node.querySelectorAll('img')).map(img => img.src || '');
            const trophies = [];
            node.querySelectorAll('.team-on-hover').forEach(card => {
                const label = card.querySelector('.trophy-text-align');
                if (!label) return;
                const rect = card.getBoundingClientRect();
                trophies.push({ text: (label.textContent || '').trim(), top: rect.top, left: rect.left });
            });
            ancestors.push({ images, trophies });
        }
        anchors.push({
            href: link.href,
            text: link.textContent || '',
            top: linkRect.top,
            left: linkRect.left,
            ancestors
        });
    });
    return JSON.stringify(anchors);
})()
"#;

/// One `a[href*="/teams/"]` as seen by the probe script
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AnchorProbe {
    pub href: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub left: f64,
    /// Nearest ancestor first
    #[serde(default)]
    pub ancestors: Vec<AncestorProbe>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AncestorProbe {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub trophies: Vec<TrophyProbe>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TrophyProbe {
    pub text: String,
    pub top: f64,
    pub left: f64,
}

/// A team resolved from a single anchor, before deduplication
#[derive(Debug, Clone, PartialEq)]
pub struct TeamCandidate {
    pub slug: String,
    pub name: String,
    pub short_name: String,
    pub link: String,
    pub image: String,
    pub championships: String,
    pub total_titles: u32,
}

pub fn url_for(base_url: &str) -> String {
    format!("{}/teams", base_url.trim_end_matches('/'))
}

pub fn scrape(
    page: &dyn PageDriver,
    browser: &BrowserConfig,
    base_url: &str,
    now: DateTime<Utc>,
) -> Result<TeamsSnapshot, ScrapeError> {
    let url = url_for(base_url);
    log::info!("Loading teams from {}", url);

    page.navigate(&url)?;
    page.settle(browser.settle());

    let probes = match page.evaluate_json(PROBE_SCRIPT) {
        Ok(value) => serde_json::from_value::<Vec<AnchorProbe>>(value)
            .map_err(|e| ScrapeError::Structural(format!("unexpected team probe shape: {}", e)))?,
        Err(e) => {
            log::warn!("Team probe script failed ({}), reading anchors from HTML", e);
            probes_from_html(&page.html()?, base_url)
        }
    };
    log::debug!("Found {} team anchors", probes.len());

    if probes.is_empty() {
        return Err(ScrapeError::UpstreamEmpty("no team links on teams page".to_string()));
    }

    let candidates: Vec<TeamCandidate> = probes.iter().filter_map(resolve_team).collect();
    let snapshot = summarize(dedup_by_slug(candidates), now);
    log::info!(
        "Processed {} unique teams ({} champions)",
        snapshot.total_teams,
        snapshot.champion_teams
    );
    Ok(snapshot)
}

/// Team slug from a link, if it points at a real team page
pub fn team_slug(href: &str) -> Option<String> {
    let slug = SLUG.captures(href)?.get(1)?.as_str().to_lowercase();
    (slug != "teams" && slug.len() > 2).then_some(slug)
}

pub fn short_code(slug: &str) -> String {
    FRANCHISES
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| slug.to_uppercase().replace('-', ""))
}

/// Display name from link text, or the title-cased slug when the text is unusable
pub fn team_name(text: &str, slug: &str) -> String {
    let mut name = collapse_whitespace(text);
    if let Some(clean) = CLEAN_NAME.captures(&name).and_then(|c| c.get(1)) {
        let clean = clean.as_str().trim();
        if clean.len() > 3 {
            name = clean.to_string();
        }
    }

    if name.chars().count() < 3 {
        name = slug
            .split('-')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
    }
    name
}

fn is_team_logo(src: &str, slug: &str, code: &str) -> bool {
    let src = src.to_lowercase();
    if !(src.contains("logos") || src.contains("logooutline")) {
        return false;
    }
    let code = code.to_lowercase();
    src.contains(&format!("/{}/", code))
        || src.contains(&format!("{}outline", code))
        || src.contains(&format!("/{}.png", code))
        || src.contains(slug)
        || src.contains(&format!("ipl/{}/", code))
}

/// Match an anchor to its logo and championship years.
///
/// Ancestors are searched nearest first; the search stops at the first
/// level that yields a championship label close enough to the anchor.
pub fn resolve_team(probe: &AnchorProbe) -> Option<TeamCandidate> {
    let slug = team_slug(&probe.href)?;
    let code = short_code(&slug);

    let mut image = String::new();
    let mut championships = String::new();

    for ancestor in probe.ancestors.iter().take(ANCESTOR_LEVELS) {
        if image.is_empty() {
            if let Some(src) = ancestor.images.iter().find(|src| is_team_logo(src, &slug, &code)) {
                image = src.clone();
            }
        }

        let nearby = ancestor.trophies.iter().find(|t| {
            let distance = (probe.top - t.top).abs() + (probe.left - t.left).abs();
            TROPHY_YEARS.is_match(t.text.trim()) && distance < MAX_TROPHY_DISTANCE
        });
        if let Some(trophy) = nearby {
            championships = trophy.text.trim().to_string();
            break;
        }
    }

    let total_titles = if championships.is_empty() {
        0
    } else {
        championships.split('|').count() as u32
    };

    Some(TeamCandidate {
        name: team_name(&probe.text, &slug),
        short_name: code,
        link: probe.href.clone(),
        image,
        championships,
        total_titles,
        slug,
    })
}

/// Keep the first candidate for each slug, in page order
pub fn dedup_by_slug(candidates: Vec<TeamCandidate>) -> Vec<TeamCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.slug.clone()))
        .collect()
}

pub fn summarize(unique: Vec<TeamCandidate>, now: DateTime<Utc>) -> TeamsSnapshot {
    let teams: Vec<TeamProfile> = unique
        .into_iter()
        .enumerate()
        .map(|(index, c)| TeamProfile {
            id: (index + 1).to_string(),
            name: c.name,
            short_name: c.short_name,
            link: c.link,
            image: c.image,
            championships: c.championships,
            is_champion: c.total_titles > 0,
            total_titles: c.total_titles,
            extracted: now,
        })
        .collect();

    TeamsSnapshot {
        total_teams: teams.len(),
        champion_teams: teams.iter().filter(|t| t.is_champion).count(),
        teams,
        last_updated: now,
        source: SOURCE.to_string(),
    }
}

/// Layout-free probes read straight from markup. Without positions no
/// trophy label can be placed near an anchor, so only logos are found.
pub fn probes_from_html(html: &str, base_url: &str) -> Vec<AnchorProbe> {
    let document = Html::parse_document(html);
    let img_sel = selector("img");

    document
        .select(&selector(r#"a[href*="/teams/"]"#))
        .map(|link| {
            let ancestors = link
                .ancestors()
                .filter_map(ElementRef::wrap)
                .take(ANCESTOR_LEVELS)
                .map(|node| AncestorProbe {
                    images: node
                        .select(&img_sel)
                        .filter_map(|img| img.value().attr("src"))
                        .map(|src| absolute_url(base_url, src))
                        .collect(),
                    trophies: Vec::new(),
                })
                .collect();

            AnchorProbe {
                href: absolute_url(base_url, link.value().attr("href").unwrap_or_default()),
                text: link.text().collect(),
                ancestors,
                ..AnchorProbe::default()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(href: &str, text: &str, top: f64, left: f64) -> AnchorProbe {
        AnchorProbe {
            href: href.to_string(),
            text: text.to_string(),
            top,
            left,
            ancestors: Vec::new(),
        }
    }

    fn trophy(text: &str, top: f64, left: f64) -> TrophyProbe {
        TrophyProbe {
            text: text.to_string(),
            top,
            left,
        }
    }

    #[test]
    fn test_team_slug_filters_non_team_links() {
        assert_eq!(
            team_slug("https://www.iplt20.com/teams/mumbai-indians").as_deref(),
            Some("mumbai-indians")
        );
        assert_eq!(team_slug("https://www.iplt20.com/teams/teams"), None);
        assert_eq!(team_slug("https://www.iplt20.com/teams/mi"), None);
        assert_eq!(team_slug("https://www.iplt20.com/news/1"), None);
    }

    #[test]
    fn test_short_code_table_and_fallback() {
        assert_eq!(short_code("royal-challengers-bengaluru"), "RCB");
        assert_eq!(short_code("punjab-kings"), "PBKS");
        assert_eq!(short_code("deccan-chargers"), "DECCANCHARGERS");
    }

    #[test]
    fn test_team_name_cleanup() {
        assert_eq!(team_name("  Mumbai\n Indians  5 ", "mumbai-indians"), "Mumbai Indians");
        assert_eq!(team_name("", "gujarat-titans"), "Gujarat Titans");
        assert_eq!(team_name("GT", "gujarat-titans"), "Gujarat Titans");
    }

    #[test]
    fn test_resolve_logo_and_nearby_championships() {
        let mut probe = anchor("https://www.iplt20.com/teams/chennai-super-kings", "Chennai Super Kings", 100.0, 50.0);
        probe.ancestors = vec![
            AncestorProbe {
                images: vec![
                    "https://cdn/banner.jpg".into(),
                    "https://documents.iplt20.com/ipl/CSK/logos/Logooutline/CSKoutline.png".into(),
                ],
                trophies: vec![],
            },
            AncestorProbe {
                images: vec![],
                trophies: vec![
                    trophy("2010 | 2011", 900.0, 50.0),
                    trophy("2010 | 2011 | 2018 | 2021 | 2023", 120.0, 60.0),
                ],
            },
        ];

        let team = resolve_team(&probe).unwrap();
        assert_eq!(team.short_name, "CSK");
        assert!(team.image.ends_with("CSKoutline.png"));
        assert_eq!(team.championships, "2010 | 2011 | 2018 | 2021 | 2023");
        assert_eq!(team.total_titles, 5);
    }

    #[test]
    fn test_trophy_text_must_be_years() {
        let mut probe = anchor("https://www.iplt20.com/teams/delhi-capitals", "Delhi Capitals", 0.0, 0.0);
        probe.ancestors = vec![AncestorProbe {
            images: vec![],
            trophies: vec![trophy("Runners up 2020", 0.0, 0.0)],
        }];
        let team = resolve_team(&probe).unwrap();
        assert_eq!(team.total_titles, 0);
        assert!(team.championships.is_empty());
    }

    #[test]
    fn test_dedup_by_slug_first_seen_wins() {
        let probes = vec![
            anchor("https://www.iplt20.com/teams/mumbai-indians", "Mumbai Indians", 0.0, 0.0),
            anchor("https://www.iplt20.com/teams/gujarat-titans", "Gujarat Titans", 0.0, 0.0),
            anchor("https://www.iplt20.com/teams/mumbai-indians", "MI squad", 0.0, 0.0),
            anchor("https://www.iplt20.com/teams", "All teams", 0.0, 0.0),
        ];
        let unique = dedup_by_slug(probes.iter().filter_map(resolve_team).collect());
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name, "Mumbai Indians");

        let snapshot = summarize(unique, Utc::now());
        assert_eq!(snapshot.teams[0].id, "1");
        assert_eq!(snapshot.teams[1].id, "2");
        assert_eq!(snapshot.total_teams, 2);
        assert_eq!(snapshot.champion_teams, 0);
    }

    #[test]
    fn test_probe_json_shape() {
        let value = serde_json::json!([{
            "href": "https://www.iplt20.com/teams/gujarat-titans",
            "text": "Gujarat Titans",
            "top": 10.0,
            "left": 20.0,
            "ancestors": [{ "images": [], "trophies": [{ "text": "2022", "top": 15.0, "left": 25.0 }] }]
        }]);
        let probes: Vec<AnchorProbe> = serde_json::from_value(value).unwrap();
        let team = resolve_team(&probes[0]).unwrap();
        assert_eq!(team.championships, "2022");
        assert_eq!(team.total_titles, 1);
    }

    #[test]
    fn test_probes_from_html() {
        let html = r#"<div class="card">
            <img src="/ipl/MI/logos/Logooutline/MIoutline.png">
            <a href="/teams/mumbai-indians">Mumbai Indians</a>
        </div>"#;
        let probes = probes_from_html(html, "https://www.iplt20.com");
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].href, "https://www.iplt20.com/teams/mumbai-indians");

        let team = resolve_team(&probes[0]).unwrap();
        assert_eq!(
            team.image,
            "https://www.iplt20.com/ipl/MI/logos/Logooutline/MIoutline.png"
        );
    }
}
