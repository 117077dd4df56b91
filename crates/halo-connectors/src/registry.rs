//! Static connector registry.
//!
//! Metadata for all known connectors: category, core flag, description and
//! sort order. This data lives in code, not in the config file, so the
//! persisted configuration stays free of presentation concerns.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

/// Names that appear in the config file but are native subsystems, not
/// connectors (the recall service speaks plain HTTP to the app, not the
/// connector protocol). They are skipped by classification, discovery and
/// capacity accounting.
pub const NATIVE_SUBSYSTEMS: &[&str] = &["hindsight"];

/// Connector category, used for grouping and stable ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectorCategory {
    /// Always-required connectors.
    Core,
    /// Web and semantic search.
    Search,
    /// Development tooling.
    DevTools,
    /// Hosting and deployment.
    Deployment,
    /// Third-party services.
    ExternalServices,
    /// Browser and system automation.
    Automation,
    /// Niche tooling.
    Specialty,
    /// Configured but not present in the registry.
    Other,
}

impl ConnectorCategory {
    /// Sort order for category groups (lower sorts first).
    #[must_use]
    pub fn sort_order(self) -> u32 {
        match self {
            Self::Core => 0,
            Self::Search => 1,
            Self::DevTools => 2,
            Self::Deployment => 3,
            Self::ExternalServices => 4,
            Self::Automation => 5,
            Self::Specialty => 6,
            Self::Other => 7,
        }
    }

    /// i18n key for the category label.
    #[must_use]
    pub fn label_key(self) -> &'static str {
        match self {
            Self::Core => "connector.category.core",
            Self::Search => "connector.category.search",
            Self::DevTools => "connector.category.devTools",
            Self::Deployment => "connector.category.deployment",
            Self::ExternalServices => "connector.category.externalServices",
            Self::Automation => "connector.category.automation",
            Self::Specialty => "connector.category.specialty",
            Self::Other => "connector.category.other",
        }
    }
}

/// Static metadata for one registered connector.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConnectorMeta {
    /// Category for grouping.
    pub category: ConnectorCategory,
    /// Whether the connector is always required (exempt from deactivation).
    pub is_core: bool,
    /// i18n key for the settings-facing description.
    pub description_key: &'static str,
    /// Sort order within the category (lower sorts first).
    pub sort_order: u32,
}

/// Registry rows: name, category, core flag, description key, sort order.
#[rustfmt::skip]
const REGISTRY_TABLE: &[(&str, ConnectorCategory, bool, &str, u32)] = &[
    // Core
    ("memory",              ConnectorCategory::Core, true,  "connector.desc.memory",             0),
    ("sequential-thinking", ConnectorCategory::Core, true,  "connector.desc.sequentialThinking", 1),
    ("context7",            ConnectorCategory::Core, true,  "connector.desc.context7",           2),
    ("filesystem",          ConnectorCategory::Core, true,  "connector.desc.filesystem",         3),
    ("git",                 ConnectorCategory::Core, true,  "connector.desc.git",                4),
    ("github",              ConnectorCategory::Core, true,  "connector.desc.github",             5),
    ("fetch",               ConnectorCategory::Core, true,  "connector.desc.fetch",              6),
    ("supabase",            ConnectorCategory::Core, true,  "connector.desc.supabase",           7),
    ("desktop-commander",   ConnectorCategory::Core, true,  "connector.desc.desktopCommander",   8),
    // Search
    ("tavily",              ConnectorCategory::Search, false, "connector.desc.tavily",           0),
    ("exa",                 ConnectorCategory::Search, false, "connector.desc.exa",              1),
    ("firecrawl",           ConnectorCategory::Search, false, "connector.desc.firecrawl",        2),
    // Dev tools
    ("shadcn",              ConnectorCategory::DevTools, false, "connector.desc.shadcn",         0),
    ("mermaid",             ConnectorCategory::DevTools, false, "connector.desc.mermaid",        1),
    ("echarts",             ConnectorCategory::DevTools, false, "connector.desc.echarts",        2),
    ("e2b",                 ConnectorCategory::DevTools, false, "connector.desc.e2b",            3),
    ("sqlite",              ConnectorCategory::DevTools, false, "connector.desc.sqlite",         4),
    ("semgrep",             ConnectorCategory::DevTools, false, "connector.desc.semgrep",        5),
    // Deployment
    ("vercel",              ConnectorCategory::Deployment, false, "connector.desc.vercel",       0),
    ("railway",             ConnectorCategory::Deployment, false, "connector.desc.railway",      1),
    ("cloudflare",          ConnectorCategory::Deployment, false, "connector.desc.cloudflare",   2),
    ("docker-mcp",          ConnectorCategory::Deployment, false, "connector.desc.dockerMcp",    3),
    // External services
    ("stripe",              ConnectorCategory::ExternalServices, false, "connector.desc.stripe",    0),
    ("sentry",              ConnectorCategory::ExternalServices, false, "connector.desc.sentry",    1),
    ("notion",              ConnectorCategory::ExternalServices, false, "connector.desc.notion",    2),
    ("resend",              ConnectorCategory::ExternalServices, false, "connector.desc.resend",    3),
    ("upstash",             ConnectorCategory::ExternalServices, false, "connector.desc.upstash",   4),
    ("replicate",           ConnectorCategory::ExternalServices, false, "connector.desc.replicate", 5),
    ("deepl",               ConnectorCategory::ExternalServices, false, "connector.desc.deepl",     6),
    // Automation
    ("puppeteer",           ConnectorCategory::Automation, false, "connector.desc.puppeteer",    0),
    ("playwright",          ConnectorCategory::Automation, false, "connector.desc.playwright",   1),
    ("expo",                ConnectorCategory::Automation, false, "connector.desc.expo",         2),
    // Specialty
    ("figma",               ConnectorCategory::Specialty, false, "connector.desc.figma",         0),
    ("blender",             ConnectorCategory::Specialty, false, "connector.desc.blender",       1),
    ("unity",               ConnectorCategory::Specialty, false, "connector.desc.unity",         2),
    ("ollama",              ConnectorCategory::Specialty, false, "connector.desc.ollama",        3),
    ("youtube",             ConnectorCategory::Specialty, false, "connector.desc.youtube",       4),
];

/// English descriptions, locale-independent (used in agent-facing text and
/// as the keyword source for discovery).
#[rustfmt::skip]
const DESCRIPTIONS: &[(&str, &str)] = &[
    ("memory",              "Persistent memory that retains context across sessions"),
    ("sequential-thinking", "Step-by-step reasoning for complex problem solving"),
    ("context7",            "Up-to-date documentation for frameworks and libraries"),
    ("filesystem",          "File operations (read, write, search)"),
    ("git",                 "Git operations (commits, branches, diffs, history)"),
    ("github",              "GitHub integration (repos, issues, PRs, code search)"),
    ("fetch",               "Web content retrieval (pages, APIs, files)"),
    ("supabase",            "Supabase backend (database, auth, storage)"),
    ("desktop-commander",   "System control (processes, files, terminal)"),
    ("tavily",              "AI-optimized web search"),
    ("exa",                 "Semantic search with neural embeddings"),
    ("firecrawl",           "Smart web scraping and content extraction"),
    ("shadcn",              "Pre-built shadcn/ui components"),
    ("mermaid",             "Diagram generation (flowcharts, sequences, ER)"),
    ("echarts",             "Charts and data visualizations"),
    ("e2b",                 "Sandboxed code execution environment"),
    ("sqlite",              "Local SQLite database operations"),
    ("semgrep",             "Static code security analysis"),
    ("vercel",              "Vercel deployment (Next.js, serverless)"),
    ("railway",             "Railway deployment (containers, databases)"),
    ("cloudflare",          "Cloudflare Workers and Pages deployment"),
    ("docker-mcp",          "Docker gateway (100+ integrations)"),
    ("stripe",              "Stripe payments and subscriptions"),
    ("sentry",              "Error monitoring and performance"),
    ("notion",              "Notion content and documentation management"),
    ("resend",              "Transactional email sending API"),
    ("upstash",             "Serverless Redis and message queue"),
    ("replicate",           "ML inference (Stable Diffusion, LLMs, etc.)"),
    ("deepl",               "High-quality machine translation"),
    ("puppeteer",           "Chromium browser automation"),
    ("playwright",          "Multi-browser automation"),
    ("expo",                "React Native / Expo mobile development"),
    ("figma",               "Figma design import and inspection"),
    ("blender",             "Blender 3D modeling and scenes"),
    ("unity",               "Unity game development"),
    ("ollama",              "Local AI inference with Ollama"),
    ("youtube",             "YouTube video search and transcripts"),
];

static REGISTRY: LazyLock<HashMap<&'static str, ConnectorMeta>> = LazyLock::new(|| {
    REGISTRY_TABLE
        .iter()
        .map(|&(name, category, is_core, description_key, sort_order)| {
            (
                name,
                ConnectorMeta {
                    category,
                    is_core,
                    description_key,
                    sort_order,
                },
            )
        })
        .collect()
});

static DESCRIPTION_MAP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| DESCRIPTIONS.iter().copied().collect());

/// Look up registry metadata for a connector.
#[must_use]
pub fn meta(name: &str) -> Option<&'static ConnectorMeta> {
    REGISTRY.get(name)
}

/// English description for a connector, with a generic fallback for names
/// configured but not registered.
#[must_use]
pub fn description(name: &str) -> String {
    DESCRIPTION_MAP
        .get(name)
        .map_or_else(|| format!("Connector: {name}"), |d| (*d).to_string())
}

/// Iterate over every registered connector name and its description.
pub fn descriptions() -> impl Iterator<Item = (&'static str, &'static str)> {
    DESCRIPTIONS.iter().copied()
}

/// Whether a connector is marked core (always required, never removable).
#[must_use]
pub fn is_core(name: &str) -> bool {
    REGISTRY.get(name).is_some_and(|m| m.is_core)
}

/// Whether a config entry names a native subsystem rather than a connector.
#[must_use]
pub fn is_native_subsystem(name: &str) -> bool {
    NATIVE_SUBSYSTEMS.contains(&name)
}
