//! Public types for the Cachine API.

mod event;
mod key;
mod predicates;
mod properties;
pub mod time;

pub use event::{ChunkStream, EventStream, Meta, RequestEvent, StatResult};
pub use key::{CacheKey, ResourceKey};
pub use predicates::Predicates;
pub use properties::ImageProperties;
