//! Router rule grammar.
//!
//! Hostnames are declared inside router rules as `` Host(`name`) `` atoms.
//! The accepted grammar per atom is a fixed prefix `` Host(` ``, one
//! non-empty backtick-quoted token, and a fixed suffix `` `) ``. A rule may
//! contain several atoms (combined with `||` or `&&`); a rule with none
//! yields an empty endpoint set. Malformed atoms are a hard error, never
//! silently skipped.

use thiserror::Error;

/// Fixed prefix of a `Host` atom.
const HOST_PREFIX: &str = "Host(`";

/// Fixed suffix of a `Host` atom.
const HOST_SUFFIX: &str = "`)";

/// An externally routable hostname extracted from a router rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteEndpoint {
    /// The hostname.
    pub host: String,
}

/// Router rule parsing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleParseError {
    /// A `Host(` atom is not backtick-quoted or not terminated.
    #[error("Malformed Host atom in rule `{rule}` at offset {offset}")]
    MalformedAtom {
        /// The full rule text.
        rule: String,
        /// Byte offset of the offending atom.
        offset: usize,
    },
    /// A quoted hostname token is empty or contains invalid characters.
    #[error("Invalid hostname `{host}` in rule `{rule}`")]
    InvalidHost {
        /// The offending token.
        host: String,
        /// The full rule text.
        rule: String,
    },
}

/// Extract every hostname declared by a router rule.
///
/// # Errors
///
/// Returns an error if any `Host` atom deviates from the grammar.
pub fn parse_host_rule(rule: &str) -> Result<Vec<RouteEndpoint>, RuleParseError> {
    let mut endpoints = Vec::new();
    let mut cursor = 0;

    while let Some(found) = rule[cursor..].find("Host(") {
        let atom_start = cursor + found;
        let rest = &rule[atom_start..];

        if !rest.starts_with(HOST_PREFIX) {
            return Err(RuleParseError::MalformedAtom {
                rule: rule.to_string(),
                offset: atom_start,
            });
        }

        let token_start = atom_start + HOST_PREFIX.len();
        let Some(token_len) = rule[token_start..].find('`') else {
            return Err(RuleParseError::MalformedAtom {
                rule: rule.to_string(),
                offset: atom_start,
            });
        };

        let token = &rule[token_start..token_start + token_len];
        if !rule[token_start + token_len..].starts_with(HOST_SUFFIX) {
            return Err(RuleParseError::MalformedAtom {
                rule: rule.to_string(),
                offset: atom_start,
            });
        }

        if token.is_empty() || token.chars().any(|c| c.is_whitespace() || c == '`') {
            return Err(RuleParseError::InvalidHost {
                host: token.to_string(),
                rule: rule.to_string(),
            });
        }

        endpoints.push(RouteEndpoint {
            host: token.to_string(),
        });
        cursor = token_start + token_len + HOST_SUFFIX.len();
    }

    Ok(endpoints)
}
