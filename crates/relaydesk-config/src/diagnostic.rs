// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics rendered through miette.
//!
//! Figment reports unknown keys and type mismatches by path only. This module
//! resolves them against the relaydesk section table in [`crate::model`]:
//! typo suggestions, keys written into the wrong section, and where the bad
//! value came from (a TOML file with a source span, or a `RELAYDESK_*`
//! environment variable).

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::model::{SECTIONS, section_keys};

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
/// Catches typos like `reconect_delay_ms` and `base_ulr`.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "RELAYDESK_";

/// A configuration error with enough context for miette to point at it.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key or section relaydesk does not know.
    #[error("unknown key `{key}` in {}", describe_section(.section.as_deref()))]
    #[diagnostic(
        code(relaydesk::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), home.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Section the key was written in; `None` at the top level.
        section: Option<String>,
        suggestion: Option<String>,
        /// Section that does accept this key, when it was misplaced.
        home: Option<String>,
        valid_keys: String,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(
        code(relaydesk::config::invalid_type),
        help("expected {expected}; the value was set in {origin}")
    )]
    InvalidType {
        /// Dotted path, e.g. `realtime.status_grace_secs`.
        key: String,
        detail: String,
        expected: String,
        /// File path or environment variable that supplied the value.
        origin: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A semantic check failed after deserialization.
    #[error("validation error: {message}")]
    #[diagnostic(code(relaydesk::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(relaydesk::config::other))]
    Other(String),
}

fn describe_section(section: Option<&str>) -> String {
    match section {
        Some(section) => format!("[{section}]"),
        None => "the top level".to_string(),
    }
}

fn unknown_key_help(suggestion: Option<&str>, home: Option<&str>, valid_keys: &str) -> String {
    match (suggestion, home) {
        (Some(suggestion), _) => format!("did you mean `{suggestion}`? valid keys: {valid_keys}"),
        (None, Some(home)) => {
            format!("this key belongs in the [{home}] section; valid keys here: {valid_keys}")
        }
        (None, None) => format!("valid keys: {valid_keys}"),
    }
}

/// Converts every error folded into `err` into a [`ConfigError`].
///
/// `toml_sources` holds `(path, content)` pairs used to attach source spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &figment::Error, sources: &[(String, String)]) -> ConfigError {
    match &error.kind {
        Kind::UnknownField(field, expected) => unknown_key(error, field, expected, sources),
        Kind::InvalidType(actual, expected) => {
            let (span, src) = locate(error, &error.path, sources);
            ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.clone(),
                origin: value_origin(error),
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

fn unknown_key(
    error: &figment::Error,
    field: &str,
    expected: &[&str],
    sources: &[(String, String)],
) -> ConfigError {
    let section = error.path.first().cloned();
    let valid: Vec<&str> = match section.as_deref() {
        None => SECTIONS.iter().map(|(name, _)| *name).collect(),
        Some(name) => section_keys(name).map_or_else(|| expected.to_vec(), <[_]>::to_vec),
    };
    let suggestion = suggest_key(field, &valid);
    let home = match suggestion {
        Some(_) => None,
        None => home_section(field, section.as_deref()).map(str::to_string),
    };

    let mut path = error.path.clone();
    path.push(field.to_string());
    let (span, src) = locate(error, &path, sources);

    ConfigError::UnknownKey {
        key: field.to_string(),
        section,
        suggestion,
        home,
        valid_keys: valid.join(", "),
        span,
        src,
    }
}

/// The section that accepts `key`, if it is not the one it was written in.
pub fn home_section(key: &str, written_in: Option<&str>) -> Option<&'static str> {
    SECTIONS
        .iter()
        .find(|(name, keys)| Some(*name) != written_in && keys.contains(&key))
        .map(|(name, _)| *name)
}

/// Environment variable that overrides the value at `path`.
pub fn env_var_name(path: &[String]) -> String {
    format!("{ENV_PREFIX}{}", path.join("_").to_ascii_uppercase())
}

fn value_origin(error: &figment::Error) -> String {
    let Some(metadata) = error.metadata.as_ref() else {
        return "an unknown source".to_string();
    };
    match metadata.source.as_ref() {
        Some(figment::Source::File(path)) => path.display().to_string(),
        _ if metadata.name.contains("environment") => env_var_name(&error.path),
        _ => metadata.name.to_string(),
    }
}

/// Span of `path` in the TOML text that produced `error`.
///
/// Merged section tables keep the tag of the defaults, so when the error
/// carries no file the loaded sources are searched in order.
fn locate(
    error: &figment::Error,
    path: &[String],
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some((key, parents)) = path.split_last() else {
        return (None, None);
    };
    let section = parents.first().map(String::as_str);
    let preferred = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(file)) => {
            let file = file.display().to_string();
            sources.iter().find(|(name, _)| *name == file)
        }
        _ => None,
    };

    preferred
        .into_iter()
        .chain(sources)
        .find_map(|(name, content)| {
            let offset = find_key_offset(content, section, key)?;
            Some((
                Some(SourceSpan::new(offset.into(), key.len())),
                Some(NamedSource::new(name, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `key` inside `[section]`, or at the top level for `None`.
///
/// At the top level a key may also be a section header (an unknown
/// `[logging]` table), in which case the offset points at its name.
pub fn find_key_offset(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if let Some(header) = trimmed.strip_prefix('[') {
            let name = header.split(']').next().map(str::trim);
            if section.is_none() && name == Some(key) {
                return Some(offset + indent + 1 + (header.len() - header.trim_start().len()));
            }
            current = name;
        } else if current == section
            && let Some(rest) = trimmed.strip_prefix(key)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Closest entry of `valid_keys` to `unknown` by Jaro-Winkler similarity.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Renders `errors` to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}
