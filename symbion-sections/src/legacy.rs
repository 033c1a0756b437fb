/**
 * MULTI HOST SECTIONS (DEPRECATED) - Pont vers l'API legacy par check plugin
 *
 * RÔLE :
 * Encapsule le broker pour les branches legacy du moteur de checks, qui
 * demandent le contenu d'une section par nom de check plugin plutôt que
 * par nom de section parsée.
 *
 * FONCTIONNEMENT :
 * - nom de section brute = préfixe du nom de check ("df.inodes" -> "df")
 * - cluster : concaténation des lignes brutes des nœuds, dans l'ordre des nœuds
 * - parse function : plugin migré du registre, sinon table legacy, sinon contenu brut
 * - carte de management : politique host_only / host_precedence / mgmt_only
 * - cache propre, indexé par la forme de la requête
 *
 * À supprimer le jour où plus aucun check n'utilise l'API legacy.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::broker::{ParsedSection, ParsedSectionsBroker};
use crate::context::{ItemStatePrefix, RunContext};
use crate::error::{Result, SectionError};
use crate::host_sections::AgentRow;
use crate::registry::{ParseFunction, ParseOutcome};
use crate::types::{section_name_of, CacheInfo, HostKey, SectionName, SourceType};

/// Politique de recherche des données de la carte de management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardPolicy {
    /// Données de l'agent uniquement
    HostOnly,
    /// Agent d'abord, carte de management si rien trouvé
    #[default]
    HostPrecedence,
    /// Carte de management uniquement
    MgmtOnly,
}

/// Contenu d'une section tel que remis à un check legacy
#[derive(Debug, Clone, PartialEq)]
pub enum SectionContent<R = AgentRow> {
    /// Résultat de la parse function
    Parsed(ParsedSection),
    /// Aucune parse function : lignes brutes inchangées
    Raw(Vec<R>),
}

/// Infos d'un check legacy utiles au parsing
pub struct LegacyCheckInfo<R = AgentRow> {
    pub parse_function: Option<ParseFunction<R>>,
}

impl<R> LegacyCheckInfo<R> {
    pub fn without_parse_function() -> Self {
        Self { parse_function: None }
    }

    pub fn with_parse_function<F>(parse_function: F) -> Self
    where
        F: Fn(&[R], &RunContext) -> ParseOutcome + Send + Sync + 'static,
    {
        Self {
            parse_function: Some(Arc::new(parse_function)),
        }
    }
}

/// Table legacy : nom de section -> infos du check
pub type LegacyParseTable<R = AgentRow> = BTreeMap<String, LegacyCheckInfo<R>>;

/// Clé du cache : (hôte, politique carte, section, discovery ?, cluster ?)
type ContentCacheKey = (HostKey, BoardPolicy, SectionName, bool, bool);

pub struct MultiHostSections<R = AgentRow> {
    broker: ParsedSectionsBroker<R>,
    section_content_cache: HashMap<ContentCacheKey, Option<SectionContent<R>>>,
}

impl<R> MultiHostSections<R> {
    pub fn new(broker: ParsedSectionsBroker<R>) -> Self {
        Self {
            broker,
            section_content_cache: HashMap::new(),
        }
    }

    pub fn broker(&self) -> &ParsedSectionsBroker<R> {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut ParsedSectionsBroker<R> {
        &mut self.broker
    }

    pub fn into_broker(self) -> ParsedSectionsBroker<R> {
        self.broker
    }

    /// Âge des données d'une section brute ; pour un cluster, le plus ancien
    pub fn legacy_determine_cache_info(&self, section_name: &SectionName) -> Option<CacheInfo> {
        let cache_infos: Vec<CacheInfo> = self
            .broker
            .values()
            .filter_map(|host_sections| host_sections.cache_info.get(section_name).copied())
            .collect();

        let cached_at = cache_infos.iter().map(|info| info.cached_at).min()?;
        let interval = cache_infos.iter().map(|info| info.cache_interval).max()?;
        Some(CacheInfo::new(cached_at, interval))
    }
}

impl<R: Clone> MultiHostSections<R> {
    /// Prépare le contenu de section d'un check legacy, pour N'IMPORTE QUEL hôte
    ///
    /// Pour un cluster, les sections de tous les nœuds sont fusionnées. Retourne
    /// `None` quand aucun contenu n'est disponible pour ce check.
    pub fn get_section_content(
        &mut self,
        host_key: &HostKey,
        board_policy: BoardPolicy,
        check_plugin_name: &str,
        for_discovery: bool,
        cluster_node_keys: Option<&[HostKey]>,
        legacy_table: &LegacyParseTable<R>,
    ) -> Result<Option<SectionContent<R>>> {
        let section_name = section_name_of(check_plugin_name);
        let cluster_node_keys = cluster_node_keys.filter(|nodes| !nodes.is_empty());
        let cache_key = (
            host_key.clone(),
            board_policy,
            section_name.clone(),
            for_discovery,
            cluster_node_keys.is_some(),
        );

        if let Some(content) = self.section_content_cache.get(&cache_key) {
            return Ok(content.clone());
        }

        let first_source = match board_policy {
            BoardPolicy::MgmtOnly => SourceType::Management,
            BoardPolicy::HostOnly | BoardPolicy::HostPrecedence => SourceType::Host,
        };
        let mut section_content = self.section_content(
            &host_key.with_source_type(first_source),
            &section_name,
            cluster_node_keys,
            legacy_table,
        )?;

        // Rien trouvé : faut-il interroger la carte de management ?
        if section_content.is_none()
            && host_key.source_type == SourceType::Host
            && board_policy == BoardPolicy::HostPrecedence
        {
            debug!(host = %host_key, section = %section_name, "no host data, trying management board");
            section_content = self.section_content(
                &host_key.with_source_type(SourceType::Management),
                &section_name,
                cluster_node_keys,
                legacy_table,
            )?;
        }

        self.section_content_cache.insert(cache_key, section_content.clone());
        Ok(section_content)
    }

    fn section_content(
        &self,
        host_key: &HostKey,
        section_name: &SectionName,
        cluster_node_keys: Option<&[HostKey]>,
        legacy_table: &LegacyParseTable<R>,
    ) -> Result<Option<SectionContent<R>>> {
        let node_keys = cluster_node_keys.unwrap_or(std::slice::from_ref(host_key));

        // Fusion des lignes de tous les nœuds, dans l'ordre des nœuds
        let mut section_content: Option<Vec<R>> = None;
        for node_key in node_keys {
            let Some(rows) = self
                .broker
                .get(node_key)
                .and_then(|host_sections| host_sections.sections.get(section_name))
            else {
                continue;
            };
            section_content.get_or_insert_with(Vec::new).extend(rows.iter().cloned());
        }

        match section_content {
            Some(rows) => self.update_with_parse_function(rows, section_name, legacy_table),
            None => Ok(None),
        }
    }

    /// Applique la parse function de la section, si elle en a une
    ///
    /// Les sections migrées utilisent le plugin du registre, les autres la
    /// table legacy. Sans parse function, le contenu brut est rendu tel quel.
    fn update_with_parse_function(
        &self,
        rows: Vec<R>,
        section_name: &SectionName,
        legacy_table: &LegacyParseTable<R>,
    ) -> Result<Option<SectionContent<R>>> {
        let registry = self.broker.registry();
        let parse_function = if registry.is_registered_section_plugin(section_name) {
            registry
                .section_plugin(section_name)
                .map(|plugin| plugin.parse_function.clone())
        } else {
            legacy_table
                .get(section_name.as_str())
                .and_then(|info| info.parse_function.clone())
        };

        let Some(parse_function) = parse_function else {
            return Ok(Some(SectionContent::Raw(rows)));
        };

        // Les compteurs par item se rangent sous (section, None) pendant le parsing
        let context = self.broker.context();
        let outcome = {
            let _prefix = context.scoped_item_state_prefix(ItemStatePrefix::new(section_name.clone(), None));
            parse_function(rows.as_slice(), context)
        };

        match outcome {
            ParseOutcome::Parsed(Value::Null) => Ok(None),
            ParseOutcome::Parsed(value) => Ok(Some(SectionContent::Parsed(Arc::new(value)))),
            ParseOutcome::NotReady => Err(SectionError::NotReady {
                section: section_name.clone(),
            }),
            ParseOutcome::Failed(source) if context.debug() => Err(SectionError::Parse {
                section: section_name.clone(),
                source,
            }),
            ParseOutcome::Failed(source) => Err(SectionError::ParseFunction {
                section: section_name.clone(),
                source,
            }),
        }
    }
}
