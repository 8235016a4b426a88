// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Converts Figment deserialization errors into rich miette diagnostics
//! with source spans, valid key listings, and "did you mean?" suggestions
//! using Jaro-Winkler string similarity.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
/// 0.75 catches common typos like `similarity_treshold` ->
/// `similarity_threshold` or `batch_szie` -> `batch_size` while
/// filtering noise.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
///
/// Each variant carries enough context for miette to render an Elm-style
/// error message with source spans, suggestions, and valid key listings.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(converge::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The unrecognized key name.
        key: String,
        /// Suggested correction via fuzzy matching, if any.
        suggestion: Option<String>,
        /// List of valid keys for the section.
        valid_keys: String,
        /// Source span for the offending key.
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        /// The source file content for context display.
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(converge::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// The key with the wrong type.
        key: String,
        /// Description of the type mismatch.
        detail: String,
        /// What type was expected.
        expected: String,
    },

    /// A required configuration key is missing.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(converge::config::missing_key),
        help("add `{key} = <value>` to your converge.toml")
    )]
    MissingKey {
        /// The missing key name.
        key: String,
    },

    /// A validation error for a config value.
    #[error("validation error: {message}")]
    #[diagnostic(code(converge::config::validation))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(converge::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
///
/// A figment error may bundle several underlying errors; each is converted
/// to the matching `ConfigError` variant, with fuzzy suggestions and source
/// spans attached for unknown-field errors.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    let mut errors = Vec::new();

    for error in err {
        let config_error = match &error.kind {
            Kind::UnknownField(field, expected) => {
                let valid_keys: Vec<&str> = expected.to_vec();
                let suggestion = suggest_key(field, &valid_keys);
                let (span, src) = resolve_span(&error, field, toml_sources);

                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion,
                    valid_keys: valid_keys.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.clone().into_owned(),
            },
            Kind::InvalidType(actual, expected) => {
                let key = error
                    .path
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(".");
                ConfigError::InvalidType {
                    key,
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.to_string(),
                }
            }
            _ => ConfigError::Other(format!("{error}")),
        };

        errors.push(config_error);
    }

    errors
}

/// Locate an offending key in its originating TOML file, if the figment
/// error names a file we were given source content for.
fn resolve_span(
    error: &figment::error::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let source_path = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    let Some(path) = source_path else {
        return (None, None);
    };
    let Some((path, content)) = toml_sources
        .iter()
        .find(|(p, _)| *p == path)
        .map(|(p, c)| (p.as_str(), c.as_str()))
    else {
        return (None, None);
    };

    let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
    match find_key_offset(content, &section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.to_string())),
        ),
        None => (None, None),
    }
}

/// Find the byte offset of a key in TOML content, relative to a section path.
///
/// For `path = ["conversation"]` and `field = "histroy_limit"`, finds the
/// `[conversation]` header then scans line starts for the field after it.
/// Top-level fields are scanned from the start of the file.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.last() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header).map(|pos| pos + header.len())?
        }
    };

    let mut line_start = search_start;
    for line in content[search_start..].lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(field) {
            // Require a delimiter so `name` does not match `name_suffix`.
            if rest.starts_with(' ') || rest.starts_with('=') || rest.starts_with('\t') {
                return Some(line_start + (line.len() - trimmed.len()));
            }
        }
        line_start += line.len() + 1;
    }

    None
}

/// Suggest a similar key name using Jaro-Winkler string similarity.
///
/// Returns the best match above the similarity threshold, or `None` if
/// no valid key is close enough to the unknown key.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let mut best_score = SUGGESTION_THRESHOLD;
    let mut best_match = None;

    for &key in valid_keys {
        let score = strsim::jaro_winkler(unknown, key);
        if score > best_score {
            best_score = score;
            best_match = Some(key.to_string());
        }
    }

    best_match
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
