//! Positional extractors for Dotabuff pages.
//!
//! Positions count element children only; whitespace text nodes between
//! tags are ignored.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::model::{Counter, Hero, MatchRecord, Side, SideWinrate, Team};
use crate::names::{absolute_link, hero_from_link, HERO_PATH_PREFIX};

const COUNTER_CELLS: usize = 5;
const SIDE_WINRATE_CELLS: usize = 6;

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector(format!("{css}: {e:?}")))
}

fn element_children(el: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap).collect()
}

fn nth_child<'a>(el: ElementRef<'a>, n: usize, what: &'static str) -> Result<ElementRef<'a>, ParseError> {
    el.children()
        .filter_map(ElementRef::wrap)
        .nth(n)
        .ok_or(ParseError::MissingElement(what))
}

fn attr<'a>(el: ElementRef<'a>, element: &'static str, attribute: &'static str) -> Result<&'a str, ParseError> {
    el.value()
        .attr(attribute)
        .ok_or(ParseError::MissingAttribute { element, attribute })
}

fn data_value<T: FromStr>(cell: ElementRef<'_>, field: &'static str) -> Result<T, ParseError> {
    let raw = attr(cell, field, "data-value")?;
    raw.trim().parse::<T>().map_err(|_| ParseError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

/// Every hero linked from the heroes table, deduplicated by canonical name.
pub fn parse_hero_roster(doc: &Html) -> Result<Vec<Hero>, ParseError> {
    let link_selector = selector("table tbody a[href]")?;
    let mut heroes: BTreeMap<String, Hero> = BTreeMap::new();

    for a in doc.select(&link_selector) {
        let Some(href) = a.value().attr("href") else { continue };
        if href.len() > HERO_PATH_PREFIX.len() && href.starts_with(HERO_PATH_PREFIX) {
            let hero = hero_from_link(href);
            heroes.insert(hero.name.clone(), hero);
        }
    }

    Ok(heroes.into_values().collect())
}

/// One `<tr>` of a counters table: countered hero, countering hero link,
/// disadvantage, win rate, matches played.
pub fn parse_counter_row(row: ElementRef<'_>) -> Result<Counter, ParseError> {
    let cells = element_children(row);
    if cells.len() != COUNTER_CELLS {
        return Err(ParseError::CellCount {
            expected: COUNTER_CELLS,
            found: cells.len(),
        });
    }

    let link = nth_child(cells[1], 0, "counter hero link")?;
    let href = attr(link, "counter hero link", "href")?;

    Ok(Counter {
        hero: hero_from_link(href),
        disadvantage: data_value(cells[2], "disadvantage")?,
        win_rate: data_value(cells[3], "win rate")?,
        matches_played: data_value(cells[4], "matches played")?,
    })
}

/// All well-formed counter rows of a counters page. Malformed rows are skipped.
pub fn parse_counters(doc: &Html) -> Result<Vec<Counter>, ParseError> {
    let row_selector = selector("table tbody tr[data-link-to]")?;
    let mut counters = Vec::new();

    for (i, row) in doc.select(&row_selector).enumerate() {
        match parse_counter_row(row) {
            Ok(counter) => counters.push(counter),
            Err(e) => warn!(row = i, "skipping counter row: {}", e),
        }
    }

    Ok(counters)
}

/// The global radiant/dire faction table. Any malformed row fails the page.
pub fn parse_side_winrates(doc: &Html) -> Result<Vec<SideWinrate>, ParseError> {
    let tbody_selector = selector("section footer article table tbody")?;
    let tbody = doc
        .select(&tbody_selector)
        .next()
        .ok_or(ParseError::MissingElement("faction table body"))?;

    let mut rows = Vec::new();
    for tr in element_children(tbody) {
        let cells = element_children(tr);
        if cells.len() != SIDE_WINRATE_CELLS {
            return Err(ParseError::CellCount {
                expected: SIDE_WINRATE_CELLS,
                found: cells.len(),
            });
        }

        let link = nth_child(cells[1], 0, "faction hero link")?;
        let hero = hero_from_link(attr(link, "faction hero link", "href")?);

        rows.push(SideWinrate {
            radiant_pick_rate: data_value(cells[2], "radiant pick rate")?,
            radiant_winrate: data_value(cells[3], "radiant win rate")?,
            dire_pick_rate: data_value(cells[4], "dire pick rate")?,
            dire_winrate: data_value(cells[5], "dire win rate")?,
            hero,
        });
    }

    debug!("parsed {} faction rows", rows.len());
    Ok(rows)
}

/// Numeric id from `https://www.dotabuff.com/matches/<id>`.
pub fn match_id_from_url(url: &str) -> Result<i64, ParseError> {
    let re = Regex::new(r"/matches/(\d+)").map_err(|e| ParseError::Selector(e.to_string()))?;
    re.captures(url)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or_else(|| ParseError::InvalidMatchUrl(url.to_string()))
}

struct ParsedSide {
    heroes: Vec<Hero>,
    team: Team,
    won: bool,
}

fn parse_side(doc: &Html, side: Side) -> Result<ParsedSide, ParseError> {
    let section_selector = selector(&format!("section.{}", side.as_str()))?;
    let section = doc
        .select(&section_selector)
        .next()
        .ok_or(ParseError::MissingElement("side section"))?;

    let header = nth_child(section, 0, "side header")?;
    let team_link = nth_child(header, 0, "team link")?;
    let team_href = attr(team_link, "team link", "href")?;
    let team_name = nth_child(team_link, 1, "team name")?
        .text()
        .collect::<String>()
        .trim()
        .to_string();

    // The win badge is the only extra child the header ever gets.
    let won = element_children(header).len() > 1;

    let article = nth_child(section, 1, "side article")?;
    let table = nth_child(article, 0, "side table")?;
    let tbody = nth_child(table, 1, "side table body")?;

    let mut heroes = Vec::new();
    for tr in element_children(tbody) {
        heroes.push(hero_from_row(tr)?);
    }

    Ok(ParsedSide {
        heroes,
        team: Team {
            name: team_name,
            link: absolute_link(team_href),
        },
        won,
    })
}

fn hero_from_row(tr: ElementRef<'_>) -> Result<Hero, ParseError> {
    let td = nth_child(tr, 0, "hero cell")?;
    let outer = nth_child(td, 0, "hero cell container")?;
    let inner = nth_child(outer, 0, "hero cell inner container")?;
    let image = nth_child(inner, 0, "hero image container")?;
    let a = nth_child(image, 2, "hero link")?;
    Ok(hero_from_link(attr(a, "hero link", "href")?))
}

fn parse_tournament_link(doc: &Html) -> Result<Option<String>, ParseError> {
    let link_selector = selector("dd a.esports-link")?;
    Ok(doc
        .select(&link_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(absolute_link))
}

/// Both rosters, teams and the result of a finished match.
pub fn parse_match(doc: &Html, url: &str) -> Result<MatchRecord, ParseError> {
    let match_id = match_id_from_url(url)?;
    let radiant = parse_side(doc, Side::Radiant)?;
    let dire = parse_side(doc, Side::Dire)?;

    Ok(MatchRecord {
        match_id,
        radiant: radiant.heroes,
        dire: dire.heroes,
        radiant_team: radiant.team,
        dire_team: dire.team,
        radiant_won: radiant.won,
        tournament_link: parse_tournament_link(doc)?,
    })
}
