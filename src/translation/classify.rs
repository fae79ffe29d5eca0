//! Field and text classification.
//!
//! Decides which JSON keys carry human-readable copy and which leaf
//! strings are worth a translation round trip. Both decisions are pure:
//! they depend only on the key name and the string's own shape.

use std::fmt;

/// A field-name pattern.
///
/// Textual form: `name` matches exactly (ASCII case-insensitive),
/// `*Suffix` matches names ending in `Suffix`, `Prefix*` matches names
/// starting with `Prefix`. Affix matches are case-sensitive so that
/// `*Id` catches `userId` but not `paid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
}

impl FieldPattern {
    /// Parse the textual form. Returns `None` for empty patterns and bare `*`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(suffix) = raw.strip_prefix('*') {
            (!suffix.is_empty()).then(|| FieldPattern::Suffix(suffix.to_string()))
        } else if let Some(prefix) = raw.strip_suffix('*') {
            (!prefix.is_empty()).then(|| FieldPattern::Prefix(prefix.to_string()))
        } else {
            (!raw.is_empty()).then(|| FieldPattern::Exact(raw.to_string()))
        }
    }

    pub fn matches(&self, field: &str) -> bool {
        match self {
            FieldPattern::Exact(name) => field.eq_ignore_ascii_case(name),
            // A bare suffix ("Id") is not the same as a field ending in it
            FieldPattern::Suffix(suffix) => field.len() > suffix.len() && field.ends_with(suffix.as_str()),
            FieldPattern::Prefix(prefix) => field.len() > prefix.len() && field.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPattern::Exact(name) => write!(f, "{}", name),
            FieldPattern::Prefix(prefix) => write!(f, "{}*", prefix),
            FieldPattern::Suffix(suffix) => write!(f, "*{}", suffix),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAction {
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub pattern: FieldPattern,
    pub action: FieldAction,
}

/// Ordered classification table. First matching row wins; no match means include.
#[derive(Debug, Clone)]
pub struct FieldRules {
    rules: Vec<FieldRule>,
}

/// Keys whose values are identifiers, timestamps, locators or credentials.
const DEFAULT_EXCLUDED: &[&str] = &[
    "id", "_id", "uuid", "slug", "key", "ref", "email", "password", "token", "hash", "url",
    "href", "link", "src", "path", "image", "img", "avatar", "thumbnail", "logo", "icon", "photo",
    "video", "file", "filename", "mimeType", "phone", "locale", "lang", "language", "status",
    "type", "role", "color", "username", "github", "linkedin", "twitter", "website", "date",
    "createdAt", "updatedAt", "publishedAt", "deletedAt", "created_at", "updated_at",
    "published_at", "order", "position", "*Id", "*_id", "*ID", "*Ids", "*Url", "*_url", "*URL",
    "*Path", "*_path", "*At", "*_at", "*Date", "*Email", "*Token", "*Key", "*Slug", "*Hash",
    "*Image", "*Icon",
];

impl FieldRules {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// Default table with deployment overrides placed in front of it.
    ///
    /// Include overrides come first so they can rescue a field the
    /// defaults would exclude; unparsable patterns are skipped.
    pub fn with_overrides(include: &[String], exclude: &[String]) -> Self {
        let overrides = include
            .iter()
            .filter_map(|p| rule(p, FieldAction::Include))
            .chain(exclude.iter().filter_map(|p| rule(p, FieldAction::Exclude)));

        let mut rules: Vec<FieldRule> = overrides.collect();
        rules.extend(Self::default().rules);
        Self { rules }
    }

    pub fn action_for(&self, field: &str) -> FieldAction {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(field))
            .map(|rule| rule.action)
            .unwrap_or(FieldAction::Include)
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.action_for(field) == FieldAction::Exclude
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }
}

impl Default for FieldRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXCLUDED
                .iter()
                .filter_map(|p| rule(p, FieldAction::Exclude))
                .collect(),
        )
    }
}

fn rule(raw: &str, action: FieldAction) -> Option<FieldRule> {
    FieldPattern::parse(raw).map(|pattern| FieldRule { pattern, action })
}

const DEFAULT_URL_PREFIXES: &[&str] = &[
    "http://", "https://", "//", "www.", "mailto:", "tel:", "data:", "blob:", "ftp://",
];

const DEFAULT_FILE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".avif", ".ico", ".bmp", ".pdf", ".doc",
    ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".rar", ".mp3", ".mp4", ".webm", ".mov",
    ".wav", ".json", ".csv", ".txt",
];

/// Content heuristics for leaf strings.
#[derive(Debug, Clone)]
pub struct TextRules {
    /// Strings with fewer characters than this (after trimming) are kept as-is
    pub min_length: usize,
    pub url_prefixes: Vec<String>,
    pub file_extensions: Vec<String>,
}

impl TextRules {
    pub fn with_min_length(min_length: usize) -> Self {
        Self {
            min_length,
            ..Self::default()
        }
    }

    pub fn is_long_enough(&self, text: &str) -> bool {
        let trimmed = text.trim();
        !trimmed.is_empty() && trimmed.chars().count() >= self.min_length
    }

    pub fn looks_like_url(&self, text: &str) -> bool {
        let lower = text.trim().to_ascii_lowercase();
        self.url_prefixes.iter().any(|p| lower.starts_with(p.as_str()))
    }

    pub fn looks_like_file(&self, text: &str) -> bool {
        let lower = text.trim().to_ascii_lowercase();
        !lower.contains(char::is_whitespace)
            && self
                .file_extensions
                .iter()
                .any(|ext| lower.ends_with(ext.as_str()))
    }

    /// Whether a leaf string should be sent for translation.
    pub fn is_translatable(&self, text: &str) -> bool {
        self.is_long_enough(text)
            && text.chars().any(char::is_alphabetic)
            && !self.looks_like_url(text)
            && !self.looks_like_file(text)
    }
}

impl Default for TextRules {
    fn default() -> Self {
        Self {
            min_length: 3,
            url_prefixes: DEFAULT_URL_PREFIXES.iter().map(|s| s.to_string()).collect(),
            file_extensions: DEFAULT_FILE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Keys holding media locations that get a root-relative `/` prefix after translation.
#[derive(Debug, Clone)]
pub struct MediaFields {
    patterns: Vec<FieldPattern>,
}

const DEFAULT_MEDIA_FIELDS: &[&str] = &[
    "image", "img", "src", "imageUrl", "image_url", "photo", "avatar", "thumbnail", "logo",
    "cover", "*Image", "*ImageUrl", "*_image", "*Src", "*Photo", "*Avatar", "*Thumbnail", "*Logo",
];

impl MediaFields {
    pub fn matches(&self, field: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(field))
    }
}

impl Default for MediaFields {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_MEDIA_FIELDS
                .iter()
                .filter_map(|p| FieldPattern::parse(p))
                .collect(),
        }
    }
}

/// Everything the walker consults to classify a document.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    pub fields: FieldRules,
    pub text: TextRules,
    pub media: MediaFields,
}
