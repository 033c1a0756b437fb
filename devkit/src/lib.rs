/*!
# Symbion DevKit - Stubs et utilitaires pour les tests du broker de sections

Bibliothèque facilitant l'écriture de tests autour de `symbion-sections` avec:
- Parse functions enregistreuses (nombre d'appels, lignes reçues, préfixe d'item state)
- Builders de section plugins et de sections brutes
- Harness qui assemble registre, contexte de run et broker
*/

pub mod parse_stub;
pub mod plugin_helpers;
pub mod test_utils;

pub use parse_stub::{RecordingParser, StubBehaviour};
pub use plugin_helpers::{host_sections, rows, PluginBuilder};
pub use test_utils::{init_tracing, BrokerHarness};
