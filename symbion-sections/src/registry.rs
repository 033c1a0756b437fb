/**
 * SECTION REGISTRY - Contrat du registre des section plugins
 *
 * RÔLE :
 * Le broker ne connaît pas les plugins : il consulte un registre qui fournit,
 * pour un hôte donné, la liste ordonnée des section plugins candidats
 * (nom brut, nom parsé, parse function, supersedes).
 *
 * FONCTIONNEMENT :
 * - SectionPlugin = petit record {name, parsed_section_name, parse_function, supersedes}
 * - SectionRegistry = trait consommé par le broker et le pont legacy
 * - SectionTable = implémentation en mémoire, indexée par nom de section brute
 * - ParseOutcome = résultat étiqueté d'une parse function (Parsed / NotReady / Failed)
 */

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::context::RunContext;
use crate::error::{Result, SectionError};
use crate::host_sections::AgentRow;
use crate::types::{ParsedSectionName, SectionName};

/// Résultat d'une parse function
#[derive(Debug)]
pub enum ParseOutcome {
    /// Contenu parsé ; `Value::Null` signifie "rien d'exploitable"
    Parsed(Value),
    /// Pas encore assez d'historique, réessayer au prochain cycle
    NotReady,
    /// La parse function a échoué
    Failed(anyhow::Error),
}

impl ParseOutcome {
    pub fn null() -> Self {
        Self::Parsed(Value::Null)
    }
}

impl From<anyhow::Result<Value>> for ParseOutcome {
    fn from(result: anyhow::Result<Value>) -> Self {
        match result {
            Ok(value) => Self::Parsed(value),
            Err(e) => Self::Failed(e),
        }
    }
}

/// Parse function d'une section : lignes brutes -> contenu parsé
pub type ParseFunction<R = AgentRow> = Arc<dyn Fn(&[R], &RunContext) -> ParseOutcome + Send + Sync>;

/// Description d'une section brute et de la façon de la parser
pub struct SectionPlugin<R = AgentRow> {
    pub name: SectionName,
    pub parsed_section_name: ParsedSectionName,
    pub parse_function: ParseFunction<R>,
    pub supersedes: BTreeSet<SectionName>,
}

impl<R> SectionPlugin<R> {
    /// Plugin dont la section parsée porte le même nom que la section brute
    pub fn new<S, F>(name: S, parse_function: F) -> Self
    where
        S: Into<SectionName>,
        F: Fn(&[R], &RunContext) -> ParseOutcome + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            parsed_section_name: ParsedSectionName::new(name.as_str()),
            name,
            parse_function: Arc::new(parse_function),
            supersedes: BTreeSet::new(),
        }
    }

    pub fn with_parsed_section_name<S: Into<ParsedSectionName>>(mut self, name: S) -> Self {
        self.parsed_section_name = name.into();
        self
    }

    pub fn with_supersedes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SectionName>,
    {
        self.supersedes = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn parse(&self, rows: &[R], context: &RunContext) -> ParseOutcome {
        (self.parse_function)(rows, context)
    }
}

impl<R> fmt::Debug for SectionPlugin<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionPlugin")
            .field("name", &self.name)
            .field("parsed_section_name", &self.parsed_section_name)
            .field("supersedes", &self.supersedes)
            .finish_non_exhaustive()
    }
}

/// Interface du registre des section plugins
pub trait SectionRegistry<R = AgentRow>: Send + Sync {
    /// Candidats pouvant produire une des sections parsées voulues, parmi les
    /// sections brutes disponibles, du plus prioritaire au moins prioritaire
    fn ranked_sections(
        &self,
        available: &BTreeSet<SectionName>,
        wanted: &BTreeSet<ParsedSectionName>,
    ) -> Vec<Arc<SectionPlugin<R>>>;

    fn section_plugin(&self, name: &SectionName) -> Option<Arc<SectionPlugin<R>>>;

    /// La section brute est-elle portée par un plugin migré ?
    fn is_registered_section_plugin(&self, name: &SectionName) -> bool {
        self.section_plugin(name).is_some()
    }
}

/// Registre en mémoire : table de section plugins indexée par nom brut
pub struct SectionTable<R = AgentRow> {
    plugins: BTreeMap<SectionName, Arc<SectionPlugin<R>>>,
}

impl<R> Default for SectionTable<R> {
    fn default() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }
}

impl<R> SectionTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un plugin ; un nom déjà présent est refusé
    pub fn register(&mut self, plugin: SectionPlugin<R>) -> Result<()> {
        if self.plugins.contains_key(&plugin.name) {
            return Err(SectionError::DuplicatePlugin(plugin.name));
        }
        self.plugins.insert(plugin.name.clone(), Arc::new(plugin));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<SectionName> {
        self.plugins.keys().cloned().collect()
    }
}

impl<R> FromIterator<SectionPlugin<R>> for SectionTable<R> {
    /// En cas de doublon, le dernier plugin l'emporte
    fn from_iter<I: IntoIterator<Item = SectionPlugin<R>>>(iter: I) -> Self {
        Self {
            plugins: iter
                .into_iter()
                .map(|plugin| (plugin.name.clone(), Arc::new(plugin)))
                .collect(),
        }
    }
}

impl<R: 'static> SectionRegistry<R> for SectionTable<R> {
    fn ranked_sections(
        &self,
        available: &BTreeSet<SectionName>,
        wanted: &BTreeSet<ParsedSectionName>,
    ) -> Vec<Arc<SectionPlugin<R>>> {
        let mut pending: Vec<Arc<SectionPlugin<R>>> = available
            .iter()
            .filter_map(|name| self.plugins.get(name))
            .filter(|plugin| wanted.contains(&plugin.parsed_section_name))
            .cloned()
            .collect();

        // Priorité : ceux qui en remplacent le plus, puis ordre alphabétique
        pending.sort_by(|a, b| {
            b.supersedes
                .len()
                .cmp(&a.supersedes.len())
                .then_with(|| a.name.cmp(&b.name))
        });

        // Un plugin passe toujours avant les sections qu'il remplace (arêtes
        // directes uniquement) : on prend le premier candidat qu'aucun autre
        // candidat restant ne remplace. En cas de cycle, la priorité tranche.
        let mut ranked = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let next = pending
                .iter()
                .position(|candidate| {
                    !pending
                        .iter()
                        .any(|other| other.name != candidate.name && other.supersedes.contains(&candidate.name))
                })
                .unwrap_or(0);
            ranked.push(pending.remove(next));
        }
        ranked
    }

    fn section_plugin(&self, name: &SectionName) -> Option<Arc<SectionPlugin<R>>> {
        self.plugins.get(name).cloned()
    }
}
