//! Source registry. Loads the built-in source definitions from embedded
//! TOML configs.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a schedule site means adding
//! a TOML file and listing it below.

use crate::error::ConfigError;
use crate::source_def::{SourceDefinition, parse_source_toml};

/// TOML configs embedded at compile time.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    // ── Tab selection ────────────────────────────────────────────────
    ("animax", include_str!("../sources/animax.toml")),
    // ── Date indexed ─────────────────────────────────────────────────
    ("wowow", include_str!("../sources/wowow.toml")),
];

/// Ids of the built-in sources, in registry order.
#[must_use]
pub fn source_ids() -> Vec<&'static str> {
    SOURCE_TOMLS.iter().map(|(id, _)| *id).collect()
}

/// Returns all built-in source definitions.
///
/// # Errors
///
/// Returns [`ConfigError`] if an embedded config is invalid.
pub fn all_sources() -> Result<Vec<SourceDefinition>, ConfigError> {
    SOURCE_TOMLS
        .iter()
        .map(|(_, toml)| parse_source_toml(toml))
        .collect()
}

/// Looks up one built-in source by id.
///
/// # Errors
///
/// Returns [`ConfigError`] if the matching embedded config is invalid.
pub fn find_source(id: &str) -> Result<Option<SourceDefinition>, ConfigError> {
    SOURCE_TOMLS
        .iter()
        .find(|(name, _)| *name == id)
        .map(|(_, toml)| parse_source_toml(toml))
        .transpose()
}

#[cfg(test)]
mod tests {
    use tv_schedule_source_models::{AttributionKind, FetcherKind};

    use super::*;

    #[test]
    fn loads_all_sources() {
        let sources = all_sources().unwrap();
        assert_eq!(sources.len(), SOURCE_TOMLS.len());
    }

    #[test]
    fn registry_keys_match_ids() {
        for source in all_sources().unwrap() {
            assert!(source_ids().contains(&source.id.as_str()), "{}", source.id);
        }
    }

    #[test]
    fn animax_is_tab_selected_and_bucketed() {
        let def = find_source("animax").unwrap().unwrap();
        assert_eq!(def.fetcher.kind(), FetcherKind::TabSelection);
        assert_eq!(def.attribution.kind(), AttributionKind::PositionBucketed);
        assert!(def.detail.is_some());
        assert_eq!(def.channels.channel_names(), vec!["アニマックス"]);
        assert_eq!(def.output.header[3], "話数");
    }

    #[test]
    fn wowow_is_date_indexed_with_three_channels() {
        let def = find_source("wowow").unwrap().unwrap();
        assert_eq!(def.fetcher.kind(), FetcherKind::DateIndexed);
        assert_eq!(def.attribution.kind(), AttributionKind::NavigationIndexed);
        assert!(def.detail.is_none());
        assert_eq!(def.channels.channel_names().len(), 3);
        assert_eq!(def.output.header[3], "説明");
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(find_source("nhk").unwrap().is_none());
    }
}
