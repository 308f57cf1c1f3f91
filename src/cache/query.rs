//! Query model for the catalog cache
//!
//! A query is a conjunction of criteria plus an optional offset/limit window.
//! Each criterion compares the value found at a dotted path inside the
//! catalog's JSON form with a literal. Paths step transparently through
//! arrays, so `datasets.id` selects the id of every dataset entry; a criterion
//! holds if any selected value satisfies it.

use crate::cache::{CacheError, CacheResult};
use crate::model::Catalog;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a [`Criterion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "contains")]
    Contains,
}

impl FromStr for Operator {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "eq" => Ok(Self::Equal),
            "!=" | "ne" => Ok(Self::NotEqual),
            "in" => Ok(Self::In),
            "like" => Ok(Self::Like),
            "contains" => Ok(Self::Contains),
            other => Err(CacheError::InvalidQuery(format!(
                "unsupported operator '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::In => "in",
            Self::Like => "like",
            Self::Contains => "contains",
        };
        f.write_str(s)
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    /// Dotted path into the catalog, e.g. `properties.originator`
    pub operand_left: String,
    pub operator: Operator,
    pub operand_right: Value,
}

impl Criterion {
    /// Creates a criterion, parsing the operator from its textual form
    pub fn new(
        operand_left: impl Into<String>,
        operator: &str,
        operand_right: impl Into<Value>,
    ) -> CacheResult<Self> {
        Ok(Self {
            operand_left: operand_left.into(),
            operator: operator.parse()?,
            operand_right: operand_right.into(),
        })
    }

    fn compile(&self) -> CacheResult<Predicate<'_>> {
        let path: Vec<&str> = self
            .operand_left
            .split('.')
            .filter(|segment| !segment.is_empty())
            .collect();

        if path.is_empty() {
            return Err(CacheError::InvalidQuery(
                "criterion path cannot be empty".to_string(),
            ));
        }

        let matcher = match self.operator {
            Operator::Equal => Matcher::Equal(&self.operand_right),
            Operator::NotEqual => Matcher::NotEqual(&self.operand_right),
            Operator::Contains => Matcher::Contains(&self.operand_right),
            Operator::In => match &self.operand_right {
                Value::Array(values) => Matcher::In(values),
                other => {
                    return Err(CacheError::InvalidQuery(format!(
                        "'in' expects a list, got {}",
                        other
                    )))
                }
            },
            Operator::Like => match &self.operand_right {
                Value::String(pattern) => Matcher::Like(like_to_regex(pattern)?),
                other => {
                    return Err(CacheError::InvalidQuery(format!(
                        "'like' expects a string pattern, got {}",
                        other
                    )))
                }
            },
        };

        Ok(Predicate { path, matcher })
    }
}

/// Filter and paging window applied to cached catalogs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default)]
    pub criteria: Vec<Criterion>,

    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub limit: Option<usize>,
}

impl QuerySpec {
    /// A query matching every catalog
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filters `catalogs` and returns owned copies of the matching window
    ///
    /// # Arguments
    ///
    /// * `catalogs` - Candidate catalogs, in the order they should be paged
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Catalog>)` - Matching catalogs after offset and limit
    /// * `Err(CacheError)` - A criterion is malformed
    pub fn apply<'a, I>(&self, catalogs: I) -> CacheResult<Vec<Catalog>>
    where
        I: IntoIterator<Item = &'a Catalog>,
    {
        let predicates = self
            .criteria
            .iter()
            .map(Criterion::compile)
            .collect::<CacheResult<Vec<_>>>()?;

        let limit = self.limit.unwrap_or(usize::MAX);
        let mut matched = Vec::new();
        let mut skipped = 0;

        for catalog in catalogs {
            if matched.len() >= limit {
                break;
            }

            if !predicates.is_empty() {
                let document = serde_json::to_value(catalog)?;
                if !predicates.iter().all(|p| p.matches(&document)) {
                    continue;
                }
            }

            if skipped < self.offset {
                skipped += 1;
                continue;
            }

            matched.push(catalog.clone());
        }

        Ok(matched)
    }
}

/// A criterion with its path split and pattern compiled
struct Predicate<'a> {
    path: Vec<&'a str>,
    matcher: Matcher<'a>,
}

enum Matcher<'a> {
    Equal(&'a Value),
    NotEqual(&'a Value),
    In(&'a [Value]),
    Like(Regex),
    Contains(&'a Value),
}

impl Predicate<'_> {
    fn matches(&self, document: &Value) -> bool {
        let mut selected = Vec::new();
        select(document, &self.path, &mut selected);

        match &self.matcher {
            Matcher::Equal(expected) => selected.iter().any(|v| *v == *expected),
            // absent values are not equal to anything
            Matcher::NotEqual(expected) => selected.iter().all(|v| *v != *expected),
            Matcher::In(options) => selected.iter().any(|v| options.contains(v)),
            Matcher::Like(regex) => selected
                .iter()
                .any(|v| v.as_str().map_or(false, |s| regex.is_match(s))),
            Matcher::Contains(needle) => selected.iter().any(|v| contains(v, needle)),
        }
    }
}

/// Collects every value reachable through `path`, fanning out over arrays
fn select<'v>(value: &'v Value, path: &[&str], out: &mut Vec<&'v Value>) {
    match (path.split_first(), value) {
        (None, _) => out.push(value),
        (Some(_), Value::Array(items)) => {
            for item in items {
                select(item, path, out);
            }
        }
        (Some((segment, rest)), Value::Object(map)) => {
            if let Some(child) = map.get(*segment) {
                select(child, rest, out);
            }
        }
        (Some(_), _) => {}
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Array(items), _) => items.contains(needle),
        (Value::String(s), Value::String(n)) => s.contains(n.as_str()),
        _ => false,
    }
}

/// Translates a SQL LIKE pattern (`%` and `_` wildcards) into an anchored regex
fn like_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| CacheError::InvalidQuery(format!("bad like pattern: {}", e)))
}
