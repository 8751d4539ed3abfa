//! Content side of the pipeline: index records, name resolution, description cleanup.

pub mod normalize;
pub mod record;
pub mod resolver;
pub mod spell;

pub use record::ContentRecord;
pub use resolver::{ContentResolver, ElasticIndex, IndexConfig, QueryStyle, SearchIndex};
pub use spell::SpellInfo;

/// Index category for feats.
pub const CATEGORY_FEAT: &str = "feat";
/// Index category for spells.
pub const CATEGORY_SPELL: &str = "spell";
