/*!
Test Harness pour le broker de sections

Facilite l'écriture de tests avec:
- Initialisation idempotente des logs (tracing) pour les tests
- Registre en mémoire alimenté par des plugins enregistreurs
- Assemblage du broker (ou du pont legacy) avec les hôtes déclarés
*/

use std::collections::HashMap;
use std::sync::Arc;
use symbion_sections::{
    HostKey, HostSections, MultiHostSections, ParsedSectionsBroker, RunContext, SectionPlugin, SectionTable,
    SourceType,
};
use tracing::debug;

use crate::parse_stub::RecordingParser;
use crate::plugin_helpers::{host_sections, PluginBuilder};

/// Init des logs pour les tests (sans effet si déjà fait)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Harness de test : registre + hôtes + contexte de run
pub struct BrokerHarness {
    table: SectionTable,
    parsers: HashMap<String, RecordingParser>,
    hosts: Vec<(HostKey, HostSections)>,
    debug: bool,
}

impl BrokerHarness {
    pub fn new() -> Self {
        init_tracing();

        Self {
            table: SectionTable::new(),
            parsers: HashMap::new(),
            hosts: Vec::new(),
            debug: false,
        }
    }

    /// Active la propagation brute des erreurs de parsing legacy
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enregistre un plugin construit par `PluginBuilder`, retourne son parser
    pub fn plugin(&mut self, builder: PluginBuilder) -> RecordingParser {
        let (plugin, parser) = builder.build();
        self.parsers.insert(plugin.name.to_string(), parser.clone());
        self.register(plugin);
        parser
    }

    /// Enregistre un plugin quelconque
    pub fn register(&mut self, plugin: SectionPlugin) {
        let name = plugin.name.clone();
        if let Err(e) = self.table.register(plugin) {
            panic!("harness setup failed: {e}");
        }
        debug!(section = %name, "registered test plugin");
    }

    /// Ajoute un hôte (source Host) avec ses sections
    pub fn host(&mut self, hostname: &str, sections: &[(&str, &[&str])]) -> &mut Self {
        self.host_sections(HostKey::new(hostname, SourceType::Host), host_sections(sections))
    }

    /// Ajoute la carte de management d'un hôte avec ses sections
    pub fn management(&mut self, hostname: &str, sections: &[(&str, &[&str])]) -> &mut Self {
        self.host_sections(HostKey::new(hostname, SourceType::Management), host_sections(sections))
    }

    pub fn host_sections(&mut self, host_key: HostKey, sections: HostSections) -> &mut Self {
        self.hosts.push((host_key, sections));
        self
    }

    /// Parser d'un plugin enregistré via `plugin()`
    pub fn parser(&self, section_name: &str) -> Option<&RecordingParser> {
        self.parsers.get(section_name)
    }

    pub fn build(self) -> ParsedSectionsBroker {
        let mut broker = ParsedSectionsBroker::new(Arc::new(self.table), Arc::new(RunContext::new(self.debug)));
        for (host_key, sections) in self.hosts {
            broker.insert(host_key, sections);
        }
        broker
    }

    pub fn build_legacy(self) -> MultiHostSections {
        MultiHostSections::new(self.build())
    }
}

impl Default for BrokerHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbion_sections::ParsedSectionName;

    #[test]
    fn test_harness_builds_broker() {
        let mut harness = BrokerHarness::new();
        let parser = harness.plugin(PluginBuilder::new("df"));
        harness.host("srv01", &[("df", &["/ 100 50"])]);
        harness.management("srv01", &[("ipmi", &["fan ok"])]);
        assert_eq!(harness.parser("df").map(RecordingParser::call_count), Some(0));

        let mut broker = harness.build();
        assert_eq!(broker.len(), 2);

        let host = HostKey::new("srv01", SourceType::Host);
        let parsed = broker.get_parsed_section(&host, &ParsedSectionName::from("df")).unwrap();
        assert_eq!(parsed.as_deref(), Some(&serde_json::json!([["/", "100", "50"]])));
        assert_eq!(parser.call_count(), 1);
    }
}
