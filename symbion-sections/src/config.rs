use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::ConfigError;
use crate::legacy::BoardPolicy;

/// Variable d'environnement pointant vers le fichier de configuration
pub const CONFIG_ENV_VAR: &str = "SYMBION_SECTIONS_CONFIG";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SectionsConfig {
    /// Laisse remonter les erreurs brutes des parse functions legacy (diagnostic)
    pub debug: bool,
    /// Politique carte de management par défaut des checks legacy
    ///
    /// Jamais lue par le crate : l'appelant la passe à
    /// `MultiHostSections::get_section_content` pour les checks sans réglage propre.
    pub board_policy: BoardPolicy,
}

impl SectionsConfig {
    pub fn from_yaml_str(txt: &str) -> Result<Self, ConfigError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(txt)?)
    }

    /// Chargement strict : toute erreur est remontée
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let txt = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&txt)
    }

    /// Charge `$SYMBION_SECTIONS_CONFIG` (ou `sections.yaml`), défauts si absent ou invalide
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| "sections.yaml".into());
        if !Path::new(&path).exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path, error = %e, "invalid sections config, using defaults");
            Self::default()
        })
    }
}
