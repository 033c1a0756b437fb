//! Persisted sections loaded from the durable section cache
//!
//! Two schema generations coexist in the cache store:
//! - `[cached_at, valid_until]` : legacy staleness marker, no payload
//! - `[cached_at, valid_until, ..., payload]` : full entry, payload is the last element
//!
//! Malformed entries are dropped without error.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

use crate::error::{Result, SectionError};
use crate::types::{CacheInfo, SectionName};

/// One entry of the persisted cache
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedEntry<R> {
    /// Old 2-element format, carries no payload
    Legacy { cached_at: i64, valid_until: i64 },
    /// Full entry with the raw rows of the section
    Full {
        cached_at: i64,
        valid_until: i64,
        payload: Vec<R>,
    },
}

impl<R> PersistedEntry<R> {
    pub fn cached_at(&self) -> i64 {
        match self {
            Self::Legacy { cached_at, .. } | Self::Full { cached_at, .. } => *cached_at,
        }
    }

    pub fn valid_until(&self) -> i64 {
        match self {
            Self::Legacy { valid_until, .. } | Self::Full { valid_until, .. } => *valid_until,
        }
    }

    pub fn cache_info(&self) -> CacheInfo {
        CacheInfo::from_validity(self.cached_at(), self.valid_until())
    }

    pub fn payload(&self) -> Option<&[R]> {
        match self {
            Self::Legacy { .. } => None,
            Self::Full { payload, .. } => Some(payload),
        }
    }
}

/// Raw section name -> persisted entry
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSections<R> {
    entries: BTreeMap<SectionName, PersistedEntry<R>>,
}

impl<R> Default for PersistedSections<R> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<R> PersistedSections<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<SectionName>>(&mut self, name: S, entry: PersistedEntry<R>) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &SectionName) -> Option<&PersistedEntry<R>> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionName, &PersistedEntry<R>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R> FromIterator<(SectionName, PersistedEntry<R>)> for PersistedSections<R> {
    fn from_iter<I: IntoIterator<Item = (SectionName, PersistedEntry<R>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<R: DeserializeOwned> PersistedSections<R> {
    /// Decodes the cache document `{ "<section>": [cached_at, valid_until, ..., payload] }`
    pub fn from_json_value(document: &Value) -> Result<Self> {
        let Value::Object(map) = document else {
            return Err(SectionError::PersistedFormat(format!(
                "expected an object, got {}",
                json_kind(document)
            )));
        };

        let mut entries = BTreeMap::new();
        for (name, raw_entry) in map {
            match decode_entry(raw_entry) {
                Some(entry) => {
                    entries.insert(SectionName::new(name.as_str()), entry);
                }
                None => trace!(section = %name, "dropping malformed persisted entry"),
            }
        }

        Ok(Self { entries })
    }

    pub fn from_json_str(document: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(document)
            .map_err(|e| SectionError::PersistedFormat(e.to_string()))?;
        Self::from_json_value(&value)
    }
}

fn decode_entry<R: DeserializeOwned>(raw_entry: &Value) -> Option<PersistedEntry<R>> {
    let items = raw_entry.as_array()?;
    let cached_at = items.first()?.as_i64()?;
    let valid_until = items.get(1)?.as_i64()?;
    // une validité qui précède la collecte (ou hors plage i64) n'a pas de sens
    valid_until.checked_sub(cached_at).filter(|interval| *interval >= 0)?;

    match items.len() {
        2 => Some(PersistedEntry::Legacy {
            cached_at,
            valid_until,
        }),
        _ => {
            let payload = serde_json::from_value(items.last()?.clone()).ok()?;
            Some(PersistedEntry::Full {
                cached_at,
                valid_until,
                payload,
            })
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
