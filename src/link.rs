//! Authority link (`$0`) parsing and matching.
//!
//! A heading field points at its authority record through one or more `$0`
//! subfields in one of two grammars:
//!
//! - parenthesized base: `(FIN11)000123456`, optionally followed by `,` or `.`
//! - resolver URN: `http://urn.fi/URN:NBN:fi:au:cn:000123456`, where the URN
//!   namespace maps back to a base through the configured URN base map
//!
//! [`LinkParser`] turns a `$0` value into a [`LinkReference`] and picks the
//! one supported link of a field. [`ChangeLinkMatcher`] goes the other way:
//! given a changed authority record it recognizes the `$0` values that point
//! at it.

use crate::error::{Result, SyncError};
use crate::record::Field;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Width authority identifiers are zero-padded to.
pub const PADDED_ID_WIDTH: usize = 9;

/// Base and URN mappings used to read and write links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Link base code -> record store base
    pub base_map: IndexMap<String, String>,
    /// Base code -> URN namespace, such as `URN:NBN:fi:au:cn:`
    pub urn_base_map: IndexMap<String, String>,
    /// Resolver URL prefix in front of URN links, such as `http://urn.fi/`
    pub urn_resolver_prefix: String,
}

impl LinkConfig {
    /// The link base that maps to a record store base.
    #[must_use]
    pub fn reverse_base(&self, store_base: &str) -> Option<&str> {
        self.base_map
            .iter()
            .find(|(_, store)| store.as_str() == store_base)
            .map(|(link, _)| link.as_str())
    }
}

/// Target of an authority link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkReference {
    /// Link base code
    pub base: String,
    /// Record identifier within the base
    pub id: String,
}

/// Left-pad an identifier with zeros to [`PADDED_ID_WIDTH`].
#[must_use]
pub fn pad_id(id: &str) -> String {
    format!("{id:0>width$}", width = PADDED_ID_WIDTH)
}

/// Parser for `$0` link values.
#[derive(Debug, Clone)]
pub struct LinkParser {
    config: LinkConfig,
    parenthesized: Regex,
    urn: Option<Regex>,
    url: Regex,
    namespaces: HashMap<String, String>,
}

impl LinkParser {
    /// Compile the link grammars for a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if a pattern fails to compile.
    pub fn new(config: LinkConfig) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| SyncError::Config(format!("invalid link pattern: {e}")))
        };

        let urn = if config.urn_resolver_prefix.is_empty() {
            None
        } else {
            Some(compile(&format!(
                "^{}(.*:)(.*)$",
                regex::escape(&config.urn_resolver_prefix)
            ))?)
        };

        let namespaces = config
            .urn_base_map
            .iter()
            .map(|(base, namespace)| (namespace.clone(), base.clone()))
            .collect();

        Ok(LinkParser {
            parenthesized: compile(r"^\((.*)\)(\d+)[,.]?$")?,
            urn,
            url: compile(r"^https?://")?,
            namespaces,
            config,
        })
    }

    /// The configuration the parser was built from.
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Parse a `$0` value.
    ///
    /// # Errors
    ///
    /// - [`SyncError::UnmappedUrn`] if a resolver link names an unknown namespace
    /// - [`SyncError::InvalidLinkFormat`] if the value matches neither grammar
    pub fn parse(&self, value: &str) -> Result<LinkReference> {
        if let Some(caps) = self.parenthesized.captures(value) {
            return Ok(LinkReference {
                base: caps[1].to_string(),
                id: caps[2].to_string(),
            });
        }

        if let Some(caps) = self.urn.as_ref().and_then(|re| re.captures(value)) {
            let namespace = &caps[1];
            return match self.namespaces.get(namespace) {
                Some(base) => Ok(LinkReference {
                    base: base.clone(),
                    id: caps[2].to_string(),
                }),
                None => Err(SyncError::UnmappedUrn {
                    value: value.to_string(),
                    namespace: namespace.to_string(),
                }),
            };
        }

        let expected_prefix = self
            .url
            .is_match(value)
            .then(|| self.config.urn_resolver_prefix.clone());
        Err(SyncError::InvalidLinkFormat {
            value: value.to_string(),
            expected_prefix,
        })
    }

    /// The single supported authority link of a field, if any.
    ///
    /// All `$0` values are parsed; links to bases outside the base map are
    /// ignored and identical links are counted once.
    ///
    /// # Errors
    ///
    /// - any error from [`LinkParser::parse`] for a malformed `$0`
    /// - [`SyncError::AmbiguousLink`] if more than one distinct supported link remains
    pub fn supported_link(&self, field: &Field) -> Result<Option<LinkReference>> {
        let mut links: Vec<LinkReference> = Vec::new();
        for value in field.subfields_by_code('0') {
            let link = self.parse(value)?;
            if self.config.base_map.contains_key(&link.base) && !links.contains(&link) {
                links.push(link);
            }
        }

        if links.len() > 1 {
            return Err(SyncError::AmbiguousLink {
                bases: links.into_iter().map(|l| l.base).collect(),
            });
        }
        Ok(links.pop())
    }
}

/// Recognizes `$0` values that point at one changed authority record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLinkMatcher {
    queries: Vec<String>,
}

impl ChangeLinkMatcher {
    /// Build the accepted link forms for a record in a record store base.
    ///
    /// Accepted are `(BASE)ID` with `BASE` the link base mapped to
    /// `store_base`, and the resolver URN of that base (or of `store_base`
    /// itself when no link base maps to it) with the identifier both as given
    /// and zero-padded. Each form also matches with a trailing `,` or `.`.
    #[must_use]
    pub fn new(config: &LinkConfig, store_base: &str, record_id: &str) -> Self {
        let mut queries = Vec::new();
        let link_base = config.reverse_base(store_base);
        if let Some(base) = link_base {
            queries.push(format!("({base}){record_id}"));
        }
        if let Some(namespace) = config.urn_base_map.get(link_base.unwrap_or(store_base)) {
            let prefix = &config.urn_resolver_prefix;
            queries.push(format!("{prefix}{namespace}{record_id}"));
            let padded = format!("{prefix}{namespace}{}", pad_id(record_id));
            if !queries.contains(&padded) {
                queries.push(padded);
            }
        }
        ChangeLinkMatcher { queries }
    }

    /// The accepted link values without trailing punctuation.
    #[must_use]
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Whether a `$0` value points at the record.
    #[must_use]
    pub fn matches_value(&self, value: &str) -> bool {
        let bare = value
            .strip_suffix(',')
            .or_else(|| value.strip_suffix('.'))
            .unwrap_or(value);
        self.queries.iter().any(|q| q == value || q == bare)
    }

    /// Whether any `$0` of the field points at the record.
    #[must_use]
    pub fn matches(&self, field: &Field) -> bool {
        field.subfields_by_code('0').any(|v| self.matches_value(v))
    }
}
