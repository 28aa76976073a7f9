use crate::model::Hero;

pub const BASE_URL: &str = "https://www.dotabuff.com";
pub const HERO_PATH_PREFIX: &str = "/heroes/";

/// Turns a hero slug ("crystal-maiden") into its display name ("Crystal Maiden").
pub fn canonical_name(slug: &str) -> String {
    // Generic title-casing gets these two wrong.
    match slug {
        "keeper-of-the-light" => return "Keeper of the Light".to_string(),
        "anti-mage" => return "Anti-Mage".to_string(),
        _ => {}
    }

    slug.split('-')
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Builds a `Hero` from a detail-page href such as `/heroes/anti-mage`.
///
/// Anything after the slug (`/counters`, query string) is dropped so links to
/// sub-pages of the same hero collapse onto one canonical hero.
pub fn hero_from_link(href: &str) -> Hero {
    let path = href.strip_prefix(BASE_URL).unwrap_or(href);
    let rest = path.strip_prefix(HERO_PATH_PREFIX).unwrap_or(path);
    let slug = rest
        .split(|c: char| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();

    Hero {
        name: canonical_name(slug),
        link: format!("{BASE_URL}{HERO_PATH_PREFIX}{slug}"),
    }
}

/// Prefixes site-relative hrefs with the site origin.
pub fn absolute_link(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{BASE_URL}{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_cases_each_hyphen_segment() {
        assert_eq!(canonical_name("crystal-maiden"), "Crystal Maiden");
        assert_eq!(canonical_name("natures-prophet"), "Natures Prophet");
        assert_eq!(canonical_name("io"), "Io");
    }

    #[test]
    fn hard_coded_exceptions() {
        assert_eq!(canonical_name("keeper-of-the-light"), "Keeper of the Light");
        assert_eq!(canonical_name("anti-mage"), "Anti-Mage");
    }

    #[test]
    fn hero_from_link_strips_sub_pages() {
        let hero = hero_from_link("/heroes/shadow-fiend/counters");
        assert_eq!(hero.name, "Shadow Fiend");
        assert_eq!(hero.link, "https://www.dotabuff.com/heroes/shadow-fiend");

        let same = hero_from_link("https://www.dotabuff.com/heroes/shadow-fiend");
        assert_eq!(hero, same);
    }

    #[test]
    fn absolute_link_keeps_full_urls() {
        assert_eq!(absolute_link("/esports/teams/15"), "https://www.dotabuff.com/esports/teams/15");
        assert_eq!(absolute_link("https://example.com/x"), "https://example.com/x");
    }
}
