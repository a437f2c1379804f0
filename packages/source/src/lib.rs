#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Config-driven broadcast schedule harvesting.
//!
//! Each schedule site is a [`SourceDefinition`] loaded from TOML. A harvest
//! drives a [`RenderSession`](tv_schedule_browser::RenderSession) across the
//! requested days ([`pagination`]), extracts program cells from every
//! rendered page, stamps each row with its calendar date ([`attribution`]),
//! fills in thumbnails from detail pages ([`detail`]) and hands back
//! [`ProgramRecord`](tv_schedule_source_models::ProgramRecord)s ready to be
//! partitioned per channel.

pub mod attribution;
pub mod detail;
pub mod error;
pub mod harvest;
pub mod labels;
pub mod pagination;
pub mod progress;
pub mod registry;
pub mod source_def;

pub use attribution::DateAttribution;
pub use error::{ConfigError, HarvestCondition, HarvestError};
pub use harvest::{HarvestOptions, HarvestReport, harvest, partition_programs};
pub use source_def::SourceDefinition;
