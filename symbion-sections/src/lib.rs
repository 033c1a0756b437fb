//! Symbion Sections - section parsing and caching broker
//!
//! Sits between the raw sections collected from the agents and the
//! check/discovery/inventory logic that consumes parsed data:
//! - `HostSections`: raw sections, cache info and piggyback data per (host, source)
//! - `ParsedSectionsBroker`: memoized parsing, superseding, cluster kwargs, data age
//! - `MultiHostSections`: deprecated bridge for checks still on the legacy API
//!
//! One broker per run. It is never shared between runs.

pub mod broker;
pub mod config;
pub mod context;
pub mod error;
pub mod host_sections;
pub mod legacy;
pub mod persisted;
pub mod registry;
pub mod types;

pub use broker::{ClusterSectionKwargs, ParsedSection, ParsedSectionsBroker, SectionKwargs};
pub use config::SectionsConfig;
pub use context::{ItemStatePrefix, ItemStatePrefixGuard, RunContext};
pub use error::{ConfigError, Result, SectionError};
pub use host_sections::{AgentRow, HostSections, PersistedMerge};
pub use legacy::{BoardPolicy, LegacyCheckInfo, LegacyParseTable, MultiHostSections, SectionContent};
pub use persisted::{PersistedEntry, PersistedSections};
pub use registry::{ParseFunction, ParseOutcome, SectionPlugin, SectionRegistry, SectionTable};
pub use types::{
    section_name_of, CacheInfo, HostKey, HostName, ParsedSectionName, SectionName, SectionSelection, SourceType,
};
