//! Extraction: taxonomy walking, pagination and per-entity detail.

mod detail;
mod menu;
mod pager;
mod taxonomy;

pub use detail::{DetailAggregator, EntityRecord, ResourceSpec};
pub use menu::{Choice, menu_values, results_values};
pub use pager::{PaginatedCollector, Record};
pub use taxonomy::{
    EntityReference, LevelOrder, ResponseShape, TaxonomyLevel, TaxonomyNode, TaxonomyWalker,
};
