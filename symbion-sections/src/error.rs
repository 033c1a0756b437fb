use crate::types::SectionName;

/// Erreurs possibles lors de la résolution des sections
///
/// Une donnée absente n'est jamais une erreur : elle se résout en `None`.
#[derive(Debug, thiserror::Error)]
pub enum SectionError {
    /// Pas encore assez d'historique, réessayer au prochain cycle
    #[error("not enough history for section {section} yet, retry next cycle")]
    NotReady { section: SectionName },
    /// Échec de la parse function, propagé tel quel
    #[error("parse function for section {section} failed: {source}")]
    Parse {
        section: SectionName,
        #[source]
        source: anyhow::Error,
    },
    /// Échec de la parse function, enveloppé par le pont legacy
    #[error("Exception in parse function of section {section}: {source:#}")]
    ParseFunction {
        section: SectionName,
        #[source]
        source: anyhow::Error,
    },
    #[error("section plugin already registered: {0}")]
    DuplicatePlugin(SectionName),
    #[error("invalid persisted sections document: {0}")]
    PersistedFormat(String),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl SectionError {
    /// Signal de contrôle "retry next cycle", pas un échec
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}

/// Erreurs de chargement de la configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = SectionError> = std::result::Result<T, E>;
