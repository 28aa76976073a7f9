use dotabuff_scraper::Hero;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Short forms a player might type for `name`:
/// two-word names give their initials ("Crystal Maiden" → "CM", "cm"),
/// otherwise names of 4+ characters give their first four ("Keep", "keep").
pub fn derive_aliases(name: &str) -> Vec<String> {
    let spaced: Vec<&str> = name.split(' ').collect();
    let dashed: Vec<&str> = name.split('-').collect();

    let pair = if spaced.len() == 2 {
        Some(spaced)
    } else if dashed.len() == 2 {
        Some(dashed)
    } else {
        None
    };

    let alias: String = match pair {
        Some(words) => words.iter().filter_map(|w| w.chars().next()).collect(),
        None if name.chars().count() >= 4 => name.chars().take(4).collect(),
        None => return Vec::new(),
    };

    let lower = alias.to_lowercase();
    if lower == alias {
        vec![alias]
    } else {
        vec![alias, lower]
    }
}

/// Lookup from every accepted spelling to its hero.
///
/// Exact names (and their lowercase forms) always beat derived aliases.
/// When two heroes derive the same alias the later one in roster order keeps
/// it; the clash stays visible through `ambiguous_aliases`.
#[derive(Debug, Clone, Default)]
pub struct HeroIndex {
    by_name: HashMap<String, Hero>,
    ambiguous: BTreeMap<String, Vec<String>>,
}

impl HeroIndex {
    pub fn build(heroes: &[Hero]) -> Self {
        let mut by_name = HashMap::new();
        let mut claims: HashMap<String, Vec<String>> = HashMap::new();

        for hero in heroes {
            for alias in derive_aliases(&hero.name) {
                claims.entry(alias.clone()).or_default().push(hero.name.clone());
                by_name.insert(alias, hero.clone());
            }
        }

        for hero in heroes {
            for exact in [hero.name.clone(), hero.name.to_lowercase()] {
                claims.entry(exact.clone()).or_default().push(hero.name.clone());
                by_name.insert(exact, hero.clone());
            }
        }

        let mut ambiguous = BTreeMap::new();
        for (key, mut candidates) in claims {
            candidates.sort();
            candidates.dedup();
            if candidates.len() > 1 {
                debug!(alias = %key, ?candidates, "ambiguous hero alias");
                ambiguous.insert(key, candidates);
            }
        }

        Self { by_name, ambiguous }
    }

    pub fn resolve(&self, name: &str) -> Option<&Hero> {
        self.by_name.get(name)
    }

    /// Aliases claimed by more than one hero, with every claimant.
    pub fn ambiguous_aliases(&self) -> &BTreeMap<String, Vec<String>> {
        &self.ambiguous
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
