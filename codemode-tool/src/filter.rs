//! Include/exclude filtering of registered tools.

use std::collections::BTreeSet;

use codemode_types::{ConfigError, ToolDefinition};

/// Environment variable listing the tools (or groups) to expose.
pub const INCLUDE_TOOLS_ENV: &str = "INCLUDE_TOOLS";
/// Environment variable listing the tools (or groups) to hide.
pub const EXCLUDE_TOOLS_ENV: &str = "EXCLUDE_TOOLS";

/// Selects which registered tools are enabled.
///
/// Entries match either a tool name or a group name. A non-empty include
/// list admits only matching tools; a matching exclude entry always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl ToolFilter {
    /// A filter that admits every tool.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Admit only tools matching one of `entries`.
    #[must_use]
    pub fn including<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: entries.into_iter().map(Into::into).collect(),
            exclude: BTreeSet::new(),
        }
    }

    /// Hide tools matching one of `entries`.
    #[must_use]
    pub fn excluding<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: BTreeSet::new(),
            exclude: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Add an exclude entry.
    #[must_use]
    pub fn with_exclude(mut self, entry: impl Into<String>) -> Self {
        self.exclude.insert(entry.into());
        self
    }

    /// Build a filter from `INCLUDE_TOOLS` / `EXCLUDE_TOOLS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Conflict`] when both variables are non-empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lists(
            std::env::var(INCLUDE_TOOLS_ENV).ok().as_deref(),
            std::env::var(EXCLUDE_TOOLS_ENV).ok().as_deref(),
        )
    }

    /// Build a filter from comma-separated include/exclude lists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Conflict`] when both lists are non-empty.
    pub fn from_lists(include: Option<&str>, exclude: Option<&str>) -> Result<Self, ConfigError> {
        let include = split_list(include);
        let exclude = split_list(exclude);
        if !include.is_empty() && !exclude.is_empty() {
            return Err(ConfigError::Conflict(format!(
                "{INCLUDE_TOOLS_ENV} and {EXCLUDE_TOOLS_ENV} cannot both be set"
            )));
        }
        Ok(Self { include, exclude })
    }

    /// Whether the tool described by `def` is admitted.
    #[must_use]
    pub fn allows(&self, def: &ToolDefinition) -> bool {
        let matches = |set: &BTreeSet<String>| {
            set.contains(&def.name) || def.group.as_ref().is_some_and(|g| set.contains(g))
        };
        if matches(&self.exclude) {
            return false;
        }
        self.include.is_empty() || matches(&self.include)
    }
}

fn split_list(raw: Option<&str>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
