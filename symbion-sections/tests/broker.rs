use serde_json::json;
use std::collections::BTreeSet;
use symbion_devkit::{BrokerHarness, PluginBuilder, RecordingParser, StubBehaviour};
use symbion_sections::{CacheInfo, HostKey, HostName, ParsedSectionName, SectionName, SectionRegistry, SourceType};

fn host(name: &str) -> HostKey {
    HostKey::new(name, SourceType::Host)
}

fn parsed(name: &str) -> ParsedSectionName {
    ParsedSectionName::from(name)
}

#[test]
fn test_parsed_section_is_memoized() {
    let mut harness = BrokerHarness::new();
    let parser = harness.plugin(PluginBuilder::new("df"));
    harness.host("srv01", &[("df", &["/ 100 50"])]);
    let mut broker = harness.build();

    let first = broker.get_parsed_section(&host("srv01"), &parsed("df")).unwrap();
    let second = broker.get_parsed_section(&host("srv01"), &parsed("df")).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.as_deref(), Some(&json!([["/", "100", "50"]])));
    assert_eq!(parser.call_count(), 1);
}

#[test]
fn test_raw_section_parsed_once_across_parsed_names() {
    let mut harness = BrokerHarness::new();
    let parser = harness.plugin(PluginBuilder::new("lnx_if").parsed_section_name("interfaces"));
    harness.host("srv01", &[("lnx_if", &["eth0 up"])]);
    let mut broker = harness.build();

    broker.get_section_kwargs(&host("srv01"), &[parsed("interfaces")]).unwrap();
    broker.get_cache_info(&[parsed("interfaces")]).unwrap();
    broker
        .determine_applicable_sections(&BTreeSet::from([parsed("interfaces")]), SourceType::Host)
        .unwrap();

    assert_eq!(parser.call_count(), 1);
}

#[test]
fn test_superseding_section_wins() {
    let mut harness = BrokerHarness::new();
    let r1 = harness.plugin(
        PluginBuilder::new("mem_used")
            .parsed_section_name("mem")
            .supersedes(&["mem_win"]),
    );
    let r2 = harness.plugin(PluginBuilder::new("mem_win").parsed_section_name("mem"));
    harness.host("srv01", &[("mem_used", &["used 512"]), ("mem_win", &["total 1024"])]);
    let mut broker = harness.build();

    let winners = broker
        .determine_applicable_sections(&BTreeSet::from([parsed("mem")]), SourceType::Host)
        .unwrap();
    let winners: Vec<&SectionName> = winners.iter().map(|plugin| &plugin.name).collect();
    assert_eq!(winners, vec![&SectionName::from("mem_used")]);

    // la section remplacée est définitivement écartée pour cet hôte
    let superseded = broker.registry().section_plugin(&"mem_win".into()).unwrap();
    assert!(broker.get_parsing_result(&host("srv01"), &superseded).unwrap().is_none());
    assert_eq!(r1.call_count(), 1);
    assert_eq!(r2.call_count(), 0);

    let resolved = broker.get_parsed_section(&host("srv01"), &parsed("mem")).unwrap();
    assert_eq!(resolved.as_deref(), Some(&json!([["used", "512"]])));
}

#[test]
fn test_superseding_wins_over_section_with_more_supersedes() {
    let mut harness = BrokerHarness::new();
    let a = harness.plugin(PluginBuilder::new("a").parsed_section_name("p").supersedes(&["b"]));
    let b = harness.plugin(PluginBuilder::new("b").parsed_section_name("p").supersedes(&["x", "y"]));
    harness.host("srv01", &[("a", &["from a"]), ("b", &["from b"])]);
    let mut broker = harness.build();

    let winners = broker
        .determine_applicable_sections(&BTreeSet::from([parsed("p")]), SourceType::Host)
        .unwrap();
    let winners: Vec<&SectionName> = winners.iter().map(|plugin| &plugin.name).collect();

    assert_eq!(winners, vec![&SectionName::from("a")]);
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 0);
}

#[test]
fn test_applicable_sections_one_winner_per_host_and_source() {
    let mut harness = BrokerHarness::new();
    harness.plugin(PluginBuilder::new("df"));
    harness.plugin(PluginBuilder::new("ipmi"));
    harness.host("srv01", &[("df", &["/"])]);
    harness.host("srv02", &[("df", &["/var"])]);
    harness.management("srv01", &[("ipmi", &["fan ok"])]);
    let mut broker = harness.build();

    let wanted = BTreeSet::from([parsed("df"), parsed("ipmi")]);
    let host_winners = broker.determine_applicable_sections(&wanted, SourceType::Host).unwrap();
    assert_eq!(host_winners.len(), 2);
    assert!(host_winners.iter().all(|plugin| plugin.name.as_str() == "df"));

    let mgmt_winners = broker.determine_applicable_sections(&wanted, SourceType::Management).unwrap();
    assert_eq!(mgmt_winners.len(), 1);
    assert_eq!(mgmt_winners[0].name, SectionName::from("ipmi"));
}

#[test]
fn test_null_parse_result_is_not_applicable() {
    let mut harness = BrokerHarness::new();
    harness.plugin(PluginBuilder::new("df").parser(RecordingParser::new(StubBehaviour::Null)));
    harness.host("srv01", &[("df", &["garbage"])]);
    let mut broker = harness.build();

    let winners = broker
        .determine_applicable_sections(&BTreeSet::from([parsed("df")]), SourceType::Host)
        .unwrap();
    assert!(winners.is_empty());
}

#[test]
fn test_section_kwargs_single_and_multiple_keys() {
    let mut harness = BrokerHarness::new();
    harness.plugin(PluginBuilder::new("df"));
    harness.plugin(PluginBuilder::new("mem"));
    harness.host("srv01", &[("df", &["/"]), ("mem", &["1024"])]);
    let mut broker = harness.build();

    let single = broker.get_section_kwargs(&host("srv01"), &[parsed("df")]).unwrap();
    assert_eq!(single.keys().collect::<Vec<_>>(), vec!["section"]);

    let multiple = broker
        .get_section_kwargs(&host("srv01"), &[parsed("df"), parsed("mem")])
        .unwrap();
    assert_eq!(multiple.keys().collect::<Vec<_>>(), vec!["section_df", "section_mem"]);
    assert!(multiple.values().all(Option::is_some));
}

#[test]
fn test_section_kwargs_partial_and_empty() {
    let mut harness = BrokerHarness::new();
    harness.plugin(PluginBuilder::new("df"));
    harness.plugin(PluginBuilder::new("mem"));
    harness.host("srv01", &[("df", &["/"])]);
    let mut broker = harness.build();

    // des données, mais une section optionnelle manquante
    let partial = broker
        .get_section_kwargs(&host("srv01"), &[parsed("df"), parsed("mem")])
        .unwrap();
    assert_eq!(partial.len(), 2);
    assert!(partial["section_mem"].is_none());

    // aucune donnée du tout
    let empty = broker.get_section_kwargs(&host("srv01"), &[parsed("mem")]).unwrap();
    assert!(empty.is_empty());
}

#[test]
fn test_cluster_kwargs_reshaped_per_node() {
    let mut harness = BrokerHarness::new();
    harness.plugin(PluginBuilder::new("df"));
    harness.host("node1", &[("df", &["/"])]);
    harness.host("node2", &[("df", &["/var"])]);
    harness.host("node3", &[]);
    let mut broker = harness.build();

    let nodes = [host("node1"), host("node2"), host("node3")];
    let kwargs = broker.get_section_cluster_kwargs(&nodes, &[parsed("df")]).unwrap();

    let per_node = &kwargs["section"];
    assert_eq!(per_node.len(), 2);
    assert_eq!(per_node[&HostName::from("node1")].as_deref(), Some(&json!([["/"]])));
    assert_eq!(per_node[&HostName::from("node2")].as_deref(), Some(&json!([["/var"]])));

    let nothing = broker.get_section_cluster_kwargs(&nodes, &[parsed("mem")]).unwrap();
    assert!(nothing.is_empty());
}

#[test]
fn test_cache_info_follows_winning_raw_section() {
    let mut harness = BrokerHarness::new();
    harness.plugin(PluginBuilder::new("df"));
    harness.host("node1", &[("df", &["/"])]);
    harness.host("node2", &[("df", &["/var"])]);
    let mut broker = harness.build();
    broker
        .get_mut(&host("node1"))
        .unwrap()
        .cache_info
        .insert("df".into(), CacheInfo::new(1_000, 120));
    broker
        .get_mut(&host("node2"))
        .unwrap()
        .cache_info
        .insert("df".into(), CacheInfo::new(900, 60));

    assert_eq!(broker.get_cache_info(&[parsed("df")]).unwrap(), Some(CacheInfo::new(900, 120)));
    assert_eq!(broker.get_cache_info(&[parsed("mem")]).unwrap(), None);
}

#[test]
fn test_not_ready_signal_reaches_caller() {
    let mut harness = BrokerHarness::new();
    harness.plugin(PluginBuilder::new("if").parser(RecordingParser::new(StubBehaviour::NotReady)));
    harness.host("srv01", &[("if", &["eth0 1234"])]);
    let mut broker = harness.build();

    let err = broker.get_section_kwargs(&host("srv01"), &[parsed("if")]).unwrap_err();
    assert!(err.is_not_ready());
}
