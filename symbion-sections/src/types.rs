/**
 * TYPES DE BASE - Identités des sections, hôtes et infos de cache
 *
 * RÔLE :
 * Vocabulaire partagé par HostSections, le broker et le pont legacy :
 * noms de sections brutes / parsées, clé d'hôte (hostname + source),
 * et la paire (cached_at, interval) qui décrit l'âge des données.
 *
 * FONCTIONNEMENT :
 * - Newtypes autour de String : un SectionName ne se confond pas avec un ParsedSectionName
 * - HostKey = (hostname, source_type) : agent principal vs carte de management
 * - CacheInfo = horodatage de collecte + durée de validité max (secondes)
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use time::OffsetDateTime;

/// Nom d'une section brute telle que produite par une source de données
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionName(String);

/// Nom du contenu sémantique après parsing (plusieurs sections brutes peuvent y mener)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedSectionName(String);

/// Nom d'un hôte monitoré
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostName(String);

macro_rules! string_newtype {
    ($ty:ident) => {
        impl $ty {
            pub fn new<S: Into<String>>(name: S) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(name: &str) -> Self {
                Self(name.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(name: String) -> Self {
                Self(name)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(SectionName);
string_newtype!(ParsedSectionName);
string_newtype!(HostName);

impl From<&HostName> for SectionName {
    /// Les données piggyback sont filtrées comme si le hostname était un nom de section
    fn from(host: &HostName) -> Self {
        Self(host.0.clone())
    }
}

/// Portée des données d'un hôte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Données de l'agent principal
    Host,
    /// Données hors-bande de la carte de management
    Management,
}

/// Identité (hostname, source) d'un jeu de sections
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostKey {
    pub hostname: HostName,
    pub source_type: SourceType,
}

impl HostKey {
    pub fn new<H: Into<HostName>>(hostname: H, source_type: SourceType) -> Self {
        Self {
            hostname: hostname.into(),
            source_type,
        }
    }

    /// Même hôte, autre portée (ex: bascule vers la carte de management)
    pub fn with_source_type(&self, source_type: SourceType) -> Self {
        Self {
            hostname: self.hostname.clone(),
            source_type,
        }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_type {
            SourceType::Host => write!(f, "{}", self.hostname),
            SourceType::Management => write!(f, "{} (management)", self.hostname),
        }
    }
}

/// Âge des données d'une section : (collectée à, intervalle de validité max)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    /// Horodatage de collecte (secondes epoch)
    pub cached_at: i64,
    /// Durée de validité max (secondes)
    pub cache_interval: i64,
}

impl CacheInfo {
    pub fn new(cached_at: i64, cache_interval: i64) -> Self {
        Self {
            cached_at,
            cache_interval,
        }
    }

    /// Dérive l'info de cache d'une entrée persistée (cached_at, valid_until)
    pub fn from_validity(cached_at: i64, valid_until: i64) -> Self {
        Self::new(cached_at, valid_until.saturating_sub(cached_at))
    }

    pub fn valid_until(&self) -> i64 {
        self.cached_at.saturating_add(self.cache_interval)
    }

    /// Horodatage de collecte en date UTC (None si hors plage)
    pub fn collected_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.cached_at).ok()
    }

    /// Données périmées à l'instant `now` ?
    pub fn is_stale_at(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() > self.valid_until()
    }
}

/// Sélection de sections pour `HostSections::filter`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SectionSelection {
    /// Pas de restriction
    #[default]
    All,
    /// Uniquement ces sections
    Only(BTreeSet<SectionName>),
}

impl SectionSelection {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SectionName>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &SectionName) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(name),
        }
    }
}

/// Nom de section brute dérivé d'un nom de check legacy ("df.inodes" -> "df")
pub fn section_name_of(check_plugin_name: &str) -> SectionName {
    SectionName::new(check_plugin_name.split('.').next().unwrap_or(check_plugin_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_section_name_of() {
        assert_eq!(section_name_of("df.inodes"), SectionName::from("df"));
        assert_eq!(section_name_of("mem"), SectionName::from("mem"));
        assert_eq!(section_name_of("a.b.c"), SectionName::from("a"));
    }

    #[test]
    fn test_host_key_source_switch() {
        let key = HostKey::new("srv01", SourceType::Host);
        let mgmt = key.with_source_type(SourceType::Management);
        assert_eq!(mgmt.hostname, key.hostname);
        assert_eq!(mgmt.source_type, SourceType::Management);
        assert_eq!(mgmt.to_string(), "srv01 (management)");
    }

    #[test]
    fn test_cache_info_validity() {
        let info = CacheInfo::from_validity(1_000, 1_300);
        assert_eq!(info, CacheInfo::new(1_000, 300));
        assert_eq!(info.valid_until(), 1_300);
        assert_eq!(info.collected_at(), Some(datetime!(1970-01-01 00:16:40 UTC)));
        assert!(!info.is_stale_at(datetime!(1970-01-01 00:21:40 UTC)));
        assert!(info.is_stale_at(datetime!(1970-01-01 00:21:41 UTC)));
    }

    #[test]
    fn test_cache_info_extreme_values_saturate() {
        let info = CacheInfo::from_validity(i64::MIN, i64::MAX);
        assert_eq!(info.cache_interval, i64::MAX);
        assert_eq!(info.valid_until(), -1);
        assert_eq!(CacheInfo::new(i64::MAX, 60).valid_until(), i64::MAX);
    }

    #[test]
    fn test_selection_contains() {
        let sel = SectionSelection::only(["df", "mem"]);
        assert!(sel.contains(&SectionName::from("df")));
        assert!(!sel.contains(&SectionName::from("cpu")));
        assert!(SectionSelection::All.contains(&SectionName::from("cpu")));
    }
}
