//! Theme Registry: topical categories, their keywords and scraping parameters.
//!
//! The YAML file is parsed into a [`ThemesFile`], validated into an immutable
//! [`ThemeSet`], and published through a [`ThemeRegistry`] that hands out
//! `Arc` snapshots. A run holds one snapshot for its whole lifetime; a reload
//! swaps the registry's pointer without touching snapshots already handed out.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Scheduling priority. Orders `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub name: String,
    pub keywords: Vec<String>,
    pub max_items_per_keyword: u32,
    pub priority: Priority,
    pub refresh_cadence: String,
    #[serde(default)]
    pub assigned_member: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThemesFile {
    #[serde(default)]
    pub global_keywords: Vec<String>,
    pub themes: Vec<ThemeConfig>,
}

/// A validated theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub name: String,
    pub keywords: Vec<String>,
    pub max_items_per_keyword: u32,
    pub priority: Priority,
    #[serde(with = "cadence_secs")]
    pub refresh_cadence: Duration,
    pub assigned_member: Option<String>,
}

mod cadence_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

/// An immutable, validated set of themes plus the global keyword pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThemeSet {
    pub themes: Vec<Theme>,
    pub global_keywords: Vec<String>,
}

impl ThemeSet {
    /// Validate a parsed file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first offending theme.
    pub fn from_file(file: ThemesFile) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut themes = Vec::with_capacity(file.themes.len());

        for cfg in file.themes {
            let name = cfg.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "theme name must be non-empty".to_string(),
                ));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate theme name: '{name}'"
                )));
            }
            if cfg.keywords.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "theme '{name}' has no keywords"
                )));
            }
            if cfg.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "theme '{name}' has a blank keyword"
                )));
            }
            if !(1..=100).contains(&cfg.max_items_per_keyword) {
                return Err(ConfigError::Validation(format!(
                    "theme '{name}' has invalid max_items_per_keyword {}; must be 1..=100",
                    cfg.max_items_per_keyword
                )));
            }
            let refresh_cadence = parse_cadence(&cfg.refresh_cadence).map_err(|reason| {
                ConfigError::Validation(format!("theme '{name}': {reason}"))
            })?;

            themes.push(Theme {
                name,
                keywords: cfg.keywords.iter().map(|k| k.trim().to_string()).collect(),
                max_items_per_keyword: cfg.max_items_per_keyword,
                priority: cfg.priority,
                refresh_cadence,
                assigned_member: cfg
                    .assigned_member
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty()),
            });
        }

        let global_keywords = file
            .global_keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        Ok(Self {
            themes,
            global_keywords,
        })
    }

    /// Exact-name lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Theme> {
        self.themes.iter().find(|t| t.name == name)
    }

    /// Case-insensitive lookup, for operator input.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Theme> {
        let wanted = name.trim().to_lowercase();
        self.themes.iter().find(|t| t.name.to_lowercase() == wanted)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.themes.iter().map(|t| t.name.as_str()).collect()
    }

    /// Themes ordered by priority, registry order within a priority.
    #[must_use]
    pub fn by_priority(&self) -> Vec<&Theme> {
        let mut ordered: Vec<&Theme> = self.themes.iter().collect();
        ordered.sort_by_key(|t| t.priority);
        ordered
    }

    /// Guess a theme for untagged text by counting keyword hits.
    ///
    /// Ties go to the higher priority, then to registry order. Returns `None`
    /// when no keyword of any theme appears in the text.
    #[must_use]
    pub fn infer_theme(&self, text: &str) -> Option<&Theme> {
        let haystack = text.to_lowercase();
        self.themes
            .iter()
            .enumerate()
            .map(|(idx, theme)| {
                let hits = theme
                    .keywords
                    .iter()
                    .filter(|k| haystack.contains(&k.to_lowercase()))
                    .count();
                (hits, theme, idx)
            })
            .filter(|(hits, _, _)| *hits > 0)
            .min_by(|(ha, ta, ia), (hb, tb, ib)| {
                hb.cmp(ha)
                    .then(ta.priority.cmp(&tb.priority))
                    .then(ia.cmp(ib))
            })
            .map(|(_, theme, _)| theme)
    }
}

/// Parse a refresh cadence: `hourly`, `daily`, `weekly`, or `<n>m`, `<n>h`, `<n>d`.
///
/// # Errors
///
/// Returns a human-readable reason for unparsable or zero durations.
pub fn parse_cadence(raw: &str) -> Result<Duration, String> {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    let value = raw.trim().to_lowercase();
    let secs = match value.as_str() {
        "hourly" => HOUR,
        "daily" => DAY,
        "weekly" => 7 * DAY,
        other => {
            let split = other.char_indices().last().map_or(0, |(idx, _)| idx);
            let (digits, unit) = other.split_at(split);
            let n: u64 = digits
                .parse()
                .map_err(|_| format!("invalid refresh_cadence '{raw}'"))?;
            let unit_secs = match unit {
                "m" => MINUTE,
                "h" => HOUR,
                "d" => DAY,
                _ => return Err(format!("invalid refresh_cadence unit in '{raw}'")),
            };
            n.checked_mul(unit_secs)
                .ok_or_else(|| format!("refresh_cadence '{raw}' overflows"))?
        }
    };

    if secs == 0 {
        return Err(format!("refresh_cadence '{raw}' must be non-zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Load and validate the themes configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_themes(path: &Path) -> Result<ThemeSet, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ThemesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: ThemesFile = serde_yaml::from_str(&content).map_err(ConfigError::ThemesFileParse)?;
    ThemeSet::from_file(file)
}

/// Process-wide holder of the current [`ThemeSet`].
#[derive(Debug)]
pub struct ThemeRegistry {
    path: Option<PathBuf>,
    current: RwLock<Arc<ThemeSet>>,
    known: RwLock<HashSet<String>>,
}

impl ThemeRegistry {
    /// Load the registry from a file at startup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the initial load fails.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let set = load_themes(&path)?;
        let mut registry = Self::from_set(set);
        registry.path = Some(path);
        Ok(registry)
    }

    /// Registry over an in-memory set. `reload` on it is a no-op.
    #[must_use]
    pub fn from_set(set: ThemeSet) -> Self {
        let known = set.themes.iter().map(|t| t.name.clone()).collect();
        Self {
            path: None,
            current: RwLock::new(Arc::new(set)),
            known: RwLock::new(known),
        }
    }

    /// The snapshot a run should hold for its entire duration.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ThemeSet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Re-read the file and publish the new set. On failure the previous
    /// snapshot stays current.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be loaded or validated.
    pub fn reload(&self) -> Result<Arc<ThemeSet>, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot());
        };
        let set = Arc::new(load_themes(path)?);

        self.known
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(set.themes.iter().map(|t| t.name.clone()));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&set);

        tracing::info!(themes = set.themes.len(), "theme registry reloaded");
        Ok(set)
    }

    /// Whether `name` belongs to the current set or any set loaded earlier.
    #[must_use]
    pub fn is_known(&self, name: &str) -> bool {
        self.known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }
}

/// Breadth of a single scrape invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "theme", rename_all = "snake_case")]
pub enum RunScope {
    Global,
    Theme(String),
    AllThemes,
}

impl RunScope {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RunScope::Global => "global",
            RunScope::Theme(_) => "theme",
            RunScope::AllThemes => "all_themes",
        }
    }

    #[must_use]
    pub fn theme(&self) -> Option<&str> {
        match self {
            RunScope::Theme(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunScope::Theme(name) => write!(f, "theme:{name}"),
            other => f.write_str(other.kind()),
        }
    }
}

#[cfg(test)]
#[path = "themes_test.rs"]
mod tests;
