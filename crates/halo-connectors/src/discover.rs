//! Intent-based connector discovery.
//!
//! Maps a free-text intent to candidate connectors via a hand-curated base
//! table merged with keywords mechanically extracted from connector
//! descriptions, so newly registered connectors are discoverable without a
//! manual mapping.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::readiness::ConnectorStatus;
use crate::registry;

/// Hand-curated intent → connector names (kept for precision; the derived
/// keyword index supplements it).
#[rustfmt::skip]
const BASE_INTENT_MAP: &[(&str, &[&str])] = &[
    ("deploy",         &["vercel", "railway", "cloudflare"]),
    ("deployment",     &["vercel", "railway", "cloudflare"]),
    ("hosting",        &["vercel", "railway", "cloudflare"]),
    ("payment",        &["stripe"]),
    ("payments",       &["stripe"]),
    ("billing",        &["stripe"]),
    ("subscription",   &["stripe"]),
    ("database",       &["supabase", "sqlite"]),
    ("db",             &["supabase", "sqlite"]),
    ("sql",            &["supabase", "sqlite"]),
    ("email",          &["resend"]),
    ("mail",           &["resend"]),
    ("search",         &["tavily", "exa", "firecrawl"]),
    ("web search",     &["tavily", "exa"]),
    ("scraping",       &["firecrawl", "puppeteer", "playwright"]),
    ("scrape",         &["firecrawl", "puppeteer", "playwright"]),
    ("crawl",          &["firecrawl"]),
    ("browser",        &["puppeteer", "playwright"]),
    ("automation",     &["desktop-commander", "puppeteer", "playwright"]),
    ("mobile",         &["expo"]),
    ("react native",   &["expo"]),
    ("ios",            &["expo"]),
    ("android",        &["expo"]),
    ("design",         &["figma", "shadcn"]),
    ("ui",             &["shadcn", "figma"]),
    ("component",      &["shadcn"]),
    ("chart",          &["echarts", "mermaid"]),
    ("diagram",        &["mermaid"]),
    ("visualization",  &["echarts"]),
    ("translation",    &["deepl"]),
    ("translate",      &["deepl"]),
    ("cms",            &["notion"]),
    ("content",        &["notion"]),
    ("monitoring",     &["sentry"]),
    ("error tracking", &["sentry"]),
    ("security",       &["semgrep"]),
    ("audit",          &["semgrep"]),
    ("3d",             &["blender", "unity"]),
    ("game",           &["unity"]),
    ("modeling",       &["blender"]),
    ("ai",             &["ollama", "replicate"]),
    ("inference",      &["ollama", "replicate"]),
    ("local ai",       &["ollama"]),
    ("ml",             &["replicate", "ollama"]),
    ("video",          &["youtube"]),
    ("docker",         &["docker-mcp"]),
    ("container",      &["docker-mcp"]),
    ("cache",          &["upstash"]),
    ("redis",          &["upstash"]),
    ("queue",          &["upstash"]),
    ("code execution", &["e2b"]),
    ("sandbox",        &["e2b"]),
    ("file",           &["filesystem"]),
    ("git",            &["git", "github"]),
    ("github",         &["github"]),
    ("documentation",  &["context7"]),
];

/// Words too generic to act as keywords.
const STOP_WORDS: &[&str] = &[
    "connector", "server", "for", "and", "the", "with", "that", "from", "via", "using",
];

/// Intent index built from the curated table plus description keywords.
#[derive(Debug)]
pub struct DiscoveryIndex {
    map: HashMap<String, Vec<String>>,
}

static INDEX: LazyLock<DiscoveryIndex> = LazyLock::new(DiscoveryIndex::build);

impl DiscoveryIndex {
    /// Build the index: curated entries first, then keywords extracted from
    /// each registered connector's description (lowercase, stop words
    /// removed, tokens of 3+ chars), plus the connector's own name.
    #[must_use]
    pub fn build() -> Self {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();

        for (key, names) in BASE_INTENT_MAP {
            map.insert(
                (*key).to_string(),
                names.iter().map(|n| (*n).to_string()).collect(),
            );
        }

        for (name, description) in registry::descriptions() {
            let cleaned: String = description
                .to_lowercase()
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' || c.is_whitespace() {
                        c
                    } else {
                        ' '
                    }
                })
                .collect();

            for word in cleaned
                .split_whitespace()
                .filter(|w| w.len() >= 3 && !STOP_WORDS.contains(w))
            {
                let entry = map.entry(word.to_string()).or_default();
                if !entry.iter().any(|n| n == name) {
                    entry.push(name.to_string());
                }
            }

            map.entry(name.to_string())
                .or_insert_with(|| vec![name.to_string()]);
        }

        Self { map }
    }

    /// The shared, lazily-built index.
    #[must_use]
    pub fn shared() -> &'static Self {
        &INDEX
    }

    /// Match an intent against the index and the given statuses.
    ///
    /// Keys match on case-insensitive substring containment in either
    /// direction; connector names and descriptions are matched directly as
    /// well. Returns the matching statuses in their ranked input order. An
    /// empty result is not an error.
    #[must_use]
    pub fn discover(&self, intent: &str, statuses: &[ConnectorStatus]) -> Vec<ConnectorStatus> {
        let intent = intent.trim().to_lowercase();
        if intent.is_empty() {
            return Vec::new();
        }

        let mut matched: Vec<String> = Vec::new();

        for (key, names) in &self.map {
            if intent.contains(key.as_str()) || key.contains(&intent) {
                for name in names {
                    if !matched.contains(name) {
                        matched.push(name.clone());
                    }
                }
            }
        }

        for status in statuses {
            if (status.name.to_lowercase().contains(&intent)
                || status.description.to_lowercase().contains(&intent))
                && !matched.contains(&status.name)
            {
                matched.push(status.name.clone());
            }
        }

        statuses
            .iter()
            .filter(|s| matched.contains(&s.name))
            .cloned()
            .collect()
    }
}

impl Default for DiscoveryIndex {
    fn default() -> Self {
        Self::build()
    }
}
