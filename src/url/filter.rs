//! Include/exclude scope filter

use crate::storage::{FilterKind, FilterStore};
use indexmap::IndexSet;
use regex::Regex;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Splits a URL into scheme, authority and the rest
const URL_PARTS_PATTERN: &str = r"^(.*:/+)([^/]*)(.*)$";

/// An ordered, duplicate-free list of compiled patterns
#[derive(Default)]
struct PatternSet {
    sources: IndexSet<String>,
    compiled: Vec<Regex>,
}

impl PatternSet {
    fn insert(&mut self, source: &str, regex: Regex) -> bool {
        if !self.sources.insert(source.to_string()) {
            return false;
        }
        self.compiled.push(regex);
        true
    }

    fn any_match(&self, url: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(url))
    }

    fn clear(&mut self) {
        self.sources.clear();
        self.compiled.clear();
    }
}

#[derive(Default)]
struct FilterState {
    session_id: Option<String>,
    includes: PatternSet,
    excludes: PatternSet,
    buffered: IndexSet<(FilterKind, String)>,
}

impl FilterState {
    fn set_mut(&mut self, kind: FilterKind) -> &mut PatternSet {
        match kind {
            FilterKind::Include => &mut self.includes,
            FilterKind::Exclude => &mut self.excludes,
        }
    }
}

/// Gate deciding which discovered URLs may enter a session's frontier
///
/// Patterns match the whole URL. Patterns added before [`ScopeFilter::init`]
/// are buffered and persisted once a session is bound.
pub struct ScopeFilter {
    store: Arc<dyn FilterStore>,
    url_parts: Option<Regex>,
    include_template: Option<String>,
    exclude_template: Option<String>,
    state: RwLock<FilterState>,
}

impl ScopeFilter {
    pub fn new(store: Arc<dyn FilterStore>) -> Self {
        Self {
            store,
            url_parts: Regex::new(URL_PARTS_PATTERN).ok(),
            include_template: None,
            exclude_template: None,
            state: RwLock::new(FilterState::default()),
        }
    }

    /// Sets the templates [`ScopeFilter::process_url`] expands seed URLs into
    ///
    /// Templates use `$1` (scheme and slashes), `$2` (authority) and `$3`
    /// (path and query), e.g. `$1$2.*` keeps a crawl on the seed's host.
    /// A reference followed by a letter, digit or `_` must be braced:
    /// `$1${2}abc`, not `$1$2abc`. See [`validate_template`].
    pub fn with_templates(
        mut self,
        include_template: Option<String>,
        exclude_template: Option<String>,
    ) -> Self {
        self.include_template = include_template;
        self.exclude_template = exclude_template;
        self
    }

    pub fn session_id(&self) -> Option<String> {
        self.read().session_id.clone()
    }

    pub fn add_include(&self, pattern: &str) {
        self.add_pattern(FilterKind::Include, pattern);
    }

    pub fn add_exclude(&self, pattern: &str) {
        self.add_pattern(FilterKind::Exclude, pattern);
    }

    fn add_pattern(&self, kind: FilterKind, pattern: &str) {
        let regex = match compile_anchored(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                tracing::warn!("Ignoring invalid {} pattern {:?}: {}", kind.to_db_string(), pattern, e);
                return;
            }
        };

        let mut state = self.write();
        if !state.set_mut(kind).insert(pattern, regex) {
            return;
        }

        match state.session_id.clone() {
            Some(session_id) => {
                if let Err(e) = self.store.add_pattern(&session_id, kind, pattern) {
                    tracing::warn!("Failed to persist pattern {:?}: {}", pattern, e);
                }
            }
            None => {
                state.buffered.insert((kind, pattern.to_string()));
            }
        }
    }

    /// Binds the filter to a session
    ///
    /// Loads the session's persisted patterns, then persists everything that
    /// was buffered. A pattern that fails to persist is logged and skipped.
    pub fn init(&self, session_id: &str) -> crate::Result<()> {
        let persisted_includes = self.store.patterns(session_id, FilterKind::Include)?;
        let persisted_excludes = self.store.patterns(session_id, FilterKind::Exclude)?;

        let mut state = self.write();
        state.session_id = Some(session_id.to_string());

        for (kind, patterns) in [
            (FilterKind::Include, persisted_includes),
            (FilterKind::Exclude, persisted_excludes),
        ] {
            for pattern in patterns {
                match compile_anchored(&pattern) {
                    Ok(regex) => {
                        state.set_mut(kind).insert(&pattern, regex);
                    }
                    Err(e) => tracing::warn!("Skipping stored pattern {:?}: {}", pattern, e),
                }
            }
        }

        let buffered: Vec<_> = state.buffered.drain(..).collect();
        for (kind, pattern) in buffered {
            if let Err(e) = self.store.add_pattern(session_id, kind, &pattern) {
                tracing::warn!("Failed to persist pattern {:?}: {}", pattern, e);
            }
        }

        tracing::debug!(
            "Scope filter bound to session {} ({} include, {} exclude)",
            session_id,
            state.includes.compiled.len(),
            state.excludes.compiled.len()
        );

        Ok(())
    }

    /// Returns whether a URL is within scope
    ///
    /// A URL is rejected when includes exist and none matches, or when any
    /// exclude matches.
    pub fn matches(&self, url: &str) -> bool {
        let state = self.read();
        if !state.includes.compiled.is_empty() && !state.includes.any_match(url) {
            return false;
        }
        !state.excludes.any_match(url)
    }

    /// Drops buffered and persisted patterns of the bound session
    pub fn clear(&self) -> crate::Result<()> {
        let mut state = self.write();
        state.includes.clear();
        state.excludes.clear();
        state.buffered.clear();
        if let Some(session_id) = &state.session_id {
            self.store.delete_patterns(session_id)?;
        }
        Ok(())
    }

    /// Derives include/exclude patterns from a URL through the configured templates
    pub fn process_url(&self, url: &str) {
        let Some(captures) = self.url_parts.as_ref().and_then(|re| re.captures(url)) else {
            return;
        };

        if let Some(template) = &self.include_template {
            let mut pattern = String::new();
            captures.expand(template, &mut pattern);
            self.add_include(&pattern);
        }

        if let Some(template) = &self.exclude_template {
            let mut pattern = String::new();
            captures.expand(template, &mut pattern);
            self.add_exclude(&pattern);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FilterState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FilterState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Checks that a seed template only references the three URL parts
///
/// `$2abc` would name a group called `2abc` and expand to nothing, so
/// references running into a word character are rejected.
pub fn validate_template(template: &str) -> Result<(), String> {
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        match bytes.get(i) {
            Some(b'$') => i += 1,
            Some(b'{') => {
                let Some(len) = template[i..].find('}') else {
                    return Err(format!("Unclosed '${{' in template '{}'", template));
                };
                check_group(template, &template[i + 1..i + len])?;
                i += len + 1;
            }
            Some(c) if c.is_ascii_alphanumeric() || *c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let name = &template[start..i];
                if !name.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(format!(
                        "Ambiguous reference '${}' in template '{}', use '${{N}}'",
                        name, template
                    ));
                }
                check_group(template, name)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_group(template: &str, name: &str) -> Result<(), String> {
    match name.parse::<u8>() {
        Ok(1..=3) => Ok(()),
        _ => Err(format!(
            "Template '{}' references unknown group '{}' (expected 1, 2 or 3)",
            template, name
        )),
    }
}

fn compile_anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}
