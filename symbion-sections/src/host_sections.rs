/**
 * HOST SECTIONS - Conteneur des sections brutes d'un hôte pour une source
 *
 * RÔLE :
 * Regroupe tout ce qu'une source (agent, carte de management) a rapporté
 * pour un hôte pendant un run : sections brutes, infos de cache, et données
 * piggyback destinées à d'autres hôtes.
 *
 * FONCTIONNEMENT :
 * - sections             : nom de section -> lignes brutes (ordre conservé)
 * - cache_info           : nom de section -> (cached_at, interval)
 * - piggybacked_raw_data : hôte cible -> lignes d'octets brutes
 * - filter / add         : projection et accumulation entre sources
 * - add_cache_info / add_persisted_sections : back-fill depuis le cache persisté
 */

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::persisted::{PersistedEntry, PersistedSections};
use crate::types::{CacheInfo, HostName, SectionName, SectionSelection};

/// Ligne brute d'un agent : les mots d'une ligne de section
pub type AgentRow = Vec<String>;

/// Sections brutes d'un hôte pour une source de données
#[derive(Debug, Clone, PartialEq)]
pub struct HostSections<R = AgentRow> {
    pub sections: BTreeMap<SectionName, Vec<R>>,
    pub cache_info: BTreeMap<SectionName, CacheInfo>,
    pub piggybacked_raw_data: BTreeMap<HostName, Vec<Vec<u8>>>,
}

impl<R> Default for HostSections<R> {
    fn default() -> Self {
        Self {
            sections: BTreeMap::new(),
            cache_info: BTreeMap::new(),
            piggybacked_raw_data: BTreeMap::new(),
        }
    }
}

/// Bilan du back-fill depuis les sections persistées
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedMerge {
    /// Sections installées depuis le cache persisté
    pub installed: Vec<SectionName>,
    /// Sections ignorées car des données live existent
    pub skipped_live: Vec<SectionName>,
    /// Entrées à l'ancien format (sans payload)
    pub skipped_legacy: Vec<SectionName>,
}

impl<R> HostSections<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sections(sections: BTreeMap<SectionName, Vec<R>>) -> Self {
        Self {
            sections,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.cache_info.is_empty() && self.piggybacked_raw_data.is_empty()
    }

    pub fn has_section(&self, name: &SectionName) -> bool {
        self.sections.contains_key(name)
    }

    pub fn section_names(&self) -> BTreeSet<SectionName> {
        self.sections.keys().cloned().collect()
    }

    /// Ajoute le contenu d'un autre HostSections à celui-ci
    ///
    /// Les lignes d'une section commune sont concaténées (les nôtres d'abord),
    /// les infos de cache de `other` écrasent les nôtres.
    pub fn add(&mut self, other: HostSections<R>) {
        for (section_name, rows) in other.sections {
            self.sections.entry(section_name).or_default().extend(rows);
        }

        for (hostname, raw_lines) in other.piggybacked_raw_data {
            self.piggybacked_raw_data.entry(hostname).or_default().extend(raw_lines);
        }

        self.cache_info.extend(other.cache_info);
    }

    /// Infos de cache des sections persistées qui ne sont pas dans les données live
    pub fn add_cache_info(&mut self, persisted: &PersistedSections<R>) {
        for (section_name, entry) in persisted.iter() {
            if self.sections.contains_key(section_name) {
                continue;
            }
            self.cache_info.insert(section_name.clone(), entry.cache_info());
        }
    }
}

impl<R: Clone> HostSections<R> {
    /// Restreint aux sections sélectionnées
    ///
    /// `SectionSelection::All` rend la même instance, sans copie.
    pub fn filter(&self, selection: &SectionSelection) -> Cow<'_, Self> {
        let SectionSelection::Only(names) = selection else {
            return Cow::Borrowed(self);
        };

        Cow::Owned(Self {
            sections: self
                .sections
                .iter()
                .filter(|(name, _)| names.contains(*name))
                .map(|(name, rows)| (name.clone(), rows.clone()))
                .collect(),
            cache_info: self
                .cache_info
                .iter()
                .filter(|(name, _)| names.contains(*name))
                .map(|(name, info)| (name.clone(), *info))
                .collect(),
            piggybacked_raw_data: self
                .piggybacked_raw_data
                .iter()
                .filter(|(host, _)| names.contains(&SectionName::from(*host)))
                .map(|(host, lines)| (host.clone(), lines.clone()))
                .collect(),
        })
    }

    /// Complète avec les sections persistées absentes des données live
    pub fn add_persisted_sections(&mut self, persisted: &PersistedSections<R>) -> PersistedMerge {
        let mut merge = PersistedMerge::default();

        for (section_name, entry) in persisted.iter() {
            let PersistedEntry::Full { payload, .. } = entry else {
                merge.skipped_legacy.push(section_name.clone());
                continue;
            };

            // Ne jamais écraser les sections reçues de la source pendant ce run
            if self.sections.contains_key(section_name) {
                debug!(section = %section_name, "skipping persisted section, live data available");
                merge.skipped_live.push(section_name.clone());
                continue;
            }

            debug!(section = %section_name, "using persisted section");
            self.sections.insert(section_name.clone(), payload.clone());
            merge.installed.push(section_name.clone());
        }

        merge
    }
}
