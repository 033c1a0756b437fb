/*!
Helpers pour construire section plugins et sections brutes de test

- `rows` : lignes d'agent à partir de texte ("/ 100 50" -> ["/", "100", "50"])
- `host_sections` : HostSections à partir de (section, lignes)
- `PluginBuilder` : SectionPlugin branché sur un RecordingParser
*/

use symbion_sections::{AgentRow, HostSections, SectionPlugin};

use crate::parse_stub::RecordingParser;

/// Découpe chaque ligne de texte en mots
pub fn rows(lines: &[&str]) -> Vec<AgentRow> {
    lines
        .iter()
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect()
}

/// HostSections contenant les sections données
pub fn host_sections(sections: &[(&str, &[&str])]) -> HostSections {
    let mut host_sections = HostSections::new();
    for (name, lines) in sections {
        host_sections.sections.insert((*name).into(), rows(lines));
    }
    host_sections
}

/// Construit un SectionPlugin dont la parse function est enregistreuse
pub struct PluginBuilder {
    name: String,
    parsed_section_name: Option<String>,
    supersedes: Vec<String>,
    parser: RecordingParser,
}

impl PluginBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            parsed_section_name: None,
            supersedes: Vec::new(),
            parser: RecordingParser::echo(),
        }
    }

    pub fn parsed_section_name<S: Into<String>>(mut self, name: S) -> Self {
        self.parsed_section_name = Some(name.into());
        self
    }

    pub fn supersedes(mut self, names: &[&str]) -> Self {
        self.supersedes = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn parser(mut self, parser: RecordingParser) -> Self {
        self.parser = parser;
        self
    }

    /// Retourne le plugin et le parser pour les assertions
    pub fn build(self) -> (SectionPlugin, RecordingParser) {
        let mut plugin = SectionPlugin::new(self.name, self.parser.parse_function())
            .with_supersedes(self.supersedes);
        if let Some(parsed) = self.parsed_section_name {
            plugin = plugin.with_parsed_section_name(parsed);
        }
        (plugin, self.parser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbion_sections::{ParsedSectionName, SectionName};

    #[test]
    fn test_rows_split_words() {
        assert_eq!(
            rows(&["/ 100 50", "tmpfs"]),
            vec![vec!["/".to_string(), "100".to_string(), "50".to_string()], vec!["tmpfs".to_string()]]
        );
    }

    #[test]
    fn test_plugin_builder() {
        let (plugin, parser) = PluginBuilder::new("mem_used")
            .parsed_section_name("mem")
            .supersedes(&["mem"])
            .build();

        assert_eq!(plugin.name, SectionName::from("mem_used"));
        assert_eq!(plugin.parsed_section_name, ParsedSectionName::from("mem"));
        assert!(plugin.supersedes.contains(&SectionName::from("mem")));
        assert_eq!(parser.call_count(), 0);
    }

    #[test]
    fn test_host_sections_builder() {
        let hs = host_sections(&[("df", &["/ 100 50"]), ("mem", &[])]);
        assert_eq!(hs.sections.len(), 2);
        assert!(hs.sections[&SectionName::from("mem")].is_empty());
    }
}
