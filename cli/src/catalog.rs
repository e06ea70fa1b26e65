//! Curated OpenRouter models offered by `/models` and `/model <alias>`.

pub struct CatalogEntry {
    pub id: &'static str,
    pub display_name: &'static str,
    pub strength: &'static str,
    pub cost: &'static str,
}

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "deepseek/deepseek-chat",
        display_name: "Deepseek",
        strength: "Logical thinking",
        cost: "Very Low",
    },
    CatalogEntry {
        id: "anthropic/claude-3.5-sonnet:beta",
        display_name: "Claude 3.5",
        strength: "Clever reasoning",
        cost: "Medium",
    },
    CatalogEntry {
        id: "openai/o1",
        display_name: "o1",
        strength: "Complex problem solving",
        cost: "High",
    },
    CatalogEntry {
        id: "openai/gpt-4o-2024-11-20",
        display_name: "4o",
        strength: "Creative writing",
        cost: "Low",
    },
    CatalogEntry {
        id: "google/gemini-2.0-flash-exp:free",
        display_name: "Gemini 2.0",
        strength: "General reasoning",
        cost: "Free",
    },
    CatalogEntry {
        id: "perplexity/llama-3.1-sonar-huge-128k-online",
        display_name: "Perplexity Sonar",
        strength: "Up-to-date info",
        cost: "Low",
    },
];

/// Look up a catalog entry by display name (case-insensitive) or exact id.
pub fn find(alias: &str) -> Option<&'static CatalogEntry> {
    let alias = alias.trim();
    CATALOG
        .iter()
        .find(|entry| entry.display_name.eq_ignore_ascii_case(alias) || entry.id == alias)
}

/// Model id for `alias`. Anything not in the catalog is taken as a raw
/// gateway id.
pub fn resolve(alias: &str) -> String {
    find(alias)
        .map(|entry| entry.id.to_string())
        .unwrap_or_else(|| alias.trim().to_string())
}

/// Human-friendly name for a model id, falling back to the id itself.
pub fn display_name(id: &str) -> &str {
    CATALOG
        .iter()
        .find(|entry| entry.id == id)
        .map_or(id, |entry| entry.display_name)
}
