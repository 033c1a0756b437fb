/**
 * PARSED SECTIONS BROKER - Agrégation, parsing et distribution des sections
 *
 * RÔLE :
 * Détient toutes les sections brutes d'un hôte (ou des nœuds d'un cluster)
 * pour un run et fournit aux plugins (checks, discovery, inventaire, labels)
 * les sections parsées et leurs infos de cache, en tenant compte de
 * `parsed_section_name` et des `supersedes`.
 *
 * FONCTIONNEMENT :
 * - data : HostKey -> HostSections, rempli par la couche de fetch
 * - mémo 1 : (hôte, section brute)  -> résultat du parsing (au plus un appel par run)
 * - mémo 2 : (hôte, section parsée) -> (résultat, cache info de la section brute gagnante)
 * - le classement des candidats est délégué au SectionRegistry
 *
 * CYCLE DE VIE :
 * Un broker par run, jamais réutilisé : les données brutes changent à chaque cycle.
 */

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::context::RunContext;
use crate::error::{Result, SectionError};
use crate::host_sections::{AgentRow, HostSections};
use crate::registry::{ParseOutcome, SectionPlugin, SectionRegistry};
use crate::types::{CacheInfo, HostKey, HostName, ParsedSectionName, SectionName, SourceType};

/// Contenu parsé partagé entre les caches et les appelants
pub type ParsedSection = Arc<Value>;

/// Arguments nommés d'une fonction de plugin pour un hôte
pub type SectionKwargs = BTreeMap<String, Option<ParsedSection>>;

/// Arguments nommés d'une fonction de plugin pour un cluster : clé -> nœud -> section
pub type ClusterSectionKwargs = BTreeMap<String, BTreeMap<HostName, Option<ParsedSection>>>;

/// Section parsée résolue et cache info de la section brute utilisée
type ResolvedSection = (Option<ParsedSection>, Option<CacheInfo>);

pub struct ParsedSectionsBroker<R = AgentRow> {
    data: BTreeMap<HostKey, HostSections<R>>,
    registry: Arc<dyn SectionRegistry<R>>,
    context: Arc<RunContext>,
    /// Résultat du parsing des sections brutes (par nom de section brute)
    memoized_parsing_results: HashMap<(HostKey, SectionName), Option<ParsedSection>>,
    /// Résultat de la section gagnante et sa cache info (par nom de section parsée !)
    memoized_parsed_sections: HashMap<(HostKey, ParsedSectionName), ResolvedSection>,
}

impl<R> ParsedSectionsBroker<R> {
    pub fn new(registry: Arc<dyn SectionRegistry<R>>, context: Arc<RunContext>) -> Self {
        Self {
            data: BTreeMap::new(),
            registry,
            context,
            memoized_parsing_results: HashMap::new(),
            memoized_parsed_sections: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &dyn SectionRegistry<R> {
        self.registry.as_ref()
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn insert(&mut self, host_key: HostKey, host_sections: HostSections<R>) -> Option<HostSections<R>> {
        self.data.insert(host_key, host_sections)
    }

    pub fn get(&self, host_key: &HostKey) -> Option<&HostSections<R>> {
        self.data.get(host_key)
    }

    pub fn get_mut(&mut self, host_key: &HostKey) -> Option<&mut HostSections<R>> {
        self.data.get_mut(host_key)
    }

    pub fn remove(&mut self, host_key: &HostKey) -> Option<HostSections<R>> {
        self.data.remove(host_key)
    }

    pub fn contains_key(&self, host_key: &HostKey) -> bool {
        self.data.contains_key(host_key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HostKey, &HostSections<R>)> {
        self.data.iter()
    }

    pub fn host_keys(&self) -> impl Iterator<Item = &HostKey> {
        self.data.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &HostSections<R>> {
        self.data.values()
    }

    /// Arguments de section pour un hôte non-cluster
    ///
    /// Une entrée (éventuellement `None`) par section requise, ou une map vide
    /// si aucune donnée n'a été trouvée.
    pub fn get_section_kwargs(
        &mut self,
        host_key: &HostKey,
        parsed_section_names: &[ParsedSectionName],
    ) -> Result<SectionKwargs> {
        let mut kwargs = SectionKwargs::new();
        for parsed_section_name in parsed_section_names {
            let key = if parsed_section_names.len() == 1 {
                "section".to_string()
            } else {
                format!("section_{parsed_section_name}")
            };
            let parsed = self.get_parsed_section(host_key, parsed_section_name)?;
            kwargs.insert(key, parsed);
        }

        // vide si rien trouvé
        if kwargs.values().all(Option::is_none) {
            kwargs.clear();
        }
        Ok(kwargs)
    }

    /// Arguments de section pour un cluster : une map nœud -> section par section requise
    pub fn get_section_cluster_kwargs(
        &mut self,
        node_keys: &[HostKey],
        parsed_section_names: &[ParsedSectionName],
    ) -> Result<ClusterSectionKwargs> {
        let mut kwargs = ClusterSectionKwargs::new();
        for node_key in node_keys {
            for (key, node_section) in self.get_section_kwargs(node_key, parsed_section_names)? {
                kwargs
                    .entry(key)
                    .or_default()
                    .insert(node_key.hostname.clone(), node_section);
            }
        }

        if kwargs.values().flat_map(BTreeMap::values).all(Option::is_none) {
            kwargs.clear();
        }
        Ok(kwargs)
    }

    /// Âge agrégé des données : (cached_at le plus ancien, intervalle le plus grand)
    pub fn get_cache_info(&mut self, parsed_section_names: &[ParsedSectionName]) -> Result<Option<CacheInfo>> {
        let host_keys: Vec<HostKey> = self.data.keys().cloned().collect();
        let mut cached_ats = Vec::new();
        let mut intervals = Vec::new();

        for host_key in &host_keys {
            for parsed_section_name in parsed_section_names {
                // Le parsing est mémoïsé, mais il faut résoudre pour savoir
                // quelle section brute a fourni la donnée.
                let (_parsed, cache_info) = self.get_parsed_section_with_cache_info(host_key, parsed_section_name)?;
                if let Some(info) = cache_info {
                    cached_ats.push(info.cached_at);
                    intervals.push(info.cache_interval);
                }
            }
        }

        Ok(cached_ats
            .iter()
            .min()
            .zip(intervals.iter().max())
            .map(|(cached_at, interval)| CacheInfo::new(*cached_at, *interval)))
    }

    pub fn get_parsed_section(
        &mut self,
        host_key: &HostKey,
        parsed_section_name: &ParsedSectionName,
    ) -> Result<Option<ParsedSection>> {
        Ok(self.get_parsed_section_with_cache_info(host_key, parsed_section_name)?.0)
    }

    fn get_parsed_section_with_cache_info(
        &mut self,
        host_key: &HostKey,
        parsed_section_name: &ParsedSectionName,
    ) -> Result<ResolvedSection> {
        let cache_key = (host_key.clone(), parsed_section_name.clone());
        if let Some(resolved) = self.memoized_parsed_sections.get(&cache_key) {
            return Ok(resolved.clone());
        }

        let Some(host_sections) = self.data.get(host_key) else {
            return Ok(self.memoized_parsed_sections.entry(cache_key).or_insert((None, None)).clone());
        };

        let candidates = self.registry.ranked_sections(
            &host_sections.section_names(),
            &BTreeSet::from([parsed_section_name.clone()]),
        );

        for section in candidates {
            let Some(parsed) = self.get_parsing_result(host_key, &section)? else {
                continue;
            };

            let cache_info = self.section_cache_info(host_key, &section.name);
            return Ok(self
                .memoized_parsed_sections
                .entry(cache_key)
                .or_insert((Some(parsed), cache_info))
                .clone());
        }

        Ok(self.memoized_parsed_sections.entry(cache_key).or_insert((None, None)).clone())
    }

    /// Parse toutes les sections données et retourne les plugins dont le résultat n'est pas nul
    ///
    /// Pour chaque hôte et chaque section parsée, le premier candidat non nul
    /// l'emporte ; les sections brutes qu'il remplace sont définitivement
    /// écartées (résultat de parsing mémoïsé à `None`).
    pub fn determine_applicable_sections(
        &mut self,
        parse_sections: &BTreeSet<ParsedSectionName>,
        source_type: SourceType,
    ) -> Result<Vec<Arc<SectionPlugin<R>>>> {
        let host_keys: Vec<HostKey> = self
            .data
            .keys()
            .filter(|key| key.source_type == source_type)
            .cloned()
            .collect();

        let mut applicable_sections = Vec::new();
        for host_key in host_keys {
            let available = match self.data.get(&host_key) {
                Some(host_sections) => host_sections.section_names(),
                None => continue,
            };

            let mut resolved: BTreeSet<ParsedSectionName> = BTreeSet::new();
            for section in self.registry.ranked_sections(&available, parse_sections) {
                if resolved.contains(&section.parsed_section_name) {
                    continue;
                }
                let Some(parsed) = self.get_parsing_result(&host_key, &section)? else {
                    continue;
                };

                let cache_info = self.section_cache_info(&host_key, &section.name);
                self.memoized_parsed_sections
                    .entry((host_key.clone(), section.parsed_section_name.clone()))
                    .or_insert((Some(parsed), cache_info));

                for superseded in &section.supersedes {
                    trace!(host = %host_key, section = %superseded, by = %section.name, "dismissing superseded section");
                    self.memoized_parsing_results
                        .insert((host_key.clone(), superseded.clone()), None);
                }

                resolved.insert(section.parsed_section_name.clone());
                applicable_sections.push(section);
            }
        }

        Ok(applicable_sections)
    }

    /// Résultat du parsing d'une section brute, mémoïsé par (hôte, section brute)
    ///
    /// Il peut avoir été calculé pendant la résolution des supersedes, ou forcé
    /// à `None` parce que la section *est* remplacée. Les échecs de parsing ne
    /// sont pas mémoïsés et remontent tels quels.
    pub fn get_parsing_result(&mut self, host_key: &HostKey, section: &SectionPlugin<R>) -> Result<Option<ParsedSection>> {
        let cache_key = (host_key.clone(), section.name.clone());
        if let Some(parsed) = self.memoized_parsing_results.get(&cache_key) {
            trace!(host = %host_key, section = %section.name, "parsing result from memo");
            return Ok(parsed.clone());
        }

        let Some(rows) = self.data.get(host_key).and_then(|hs| hs.sections.get(&section.name)) else {
            return Ok(self.memoized_parsing_results.entry(cache_key).or_insert(None).clone());
        };

        trace!(host = %host_key, section = %section.name, rows = rows.len(), "parsing raw section");
        let parsed = match section.parse(rows, &self.context) {
            ParseOutcome::Parsed(Value::Null) => None,
            ParseOutcome::Parsed(value) => Some(Arc::new(value)),
            ParseOutcome::NotReady => {
                return Err(SectionError::NotReady {
                    section: section.name.clone(),
                })
            }
            ParseOutcome::Failed(source) => {
                return Err(SectionError::Parse {
                    section: section.name.clone(),
                    source,
                })
            }
        };

        Ok(self.memoized_parsing_results.entry(cache_key).or_insert(parsed).clone())
    }

    fn section_cache_info(&self, host_key: &HostKey, section_name: &SectionName) -> Option<CacheInfo> {
        self.data
            .get(host_key)
            .and_then(|hs| hs.cache_info.get(section_name))
            .copied()
    }
}

impl<R: fmt::Debug> fmt::Debug for ParsedSectionsBroker<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedSectionsBroker")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
