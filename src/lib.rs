//! Cachine - read-through, write-through cache for derived resources
//!
//! A caller asks for a resource under a set of transform properties (for
//! example an image at 320x240). Cachine compares modification times of the
//! original in the *origin* store and the derived variant in the *cache*
//! store, then either streams the cached variant, or regenerates it from
//! the origin while writing it to the cache and to the caller in one pass.
//! When the caller already holds a current copy, no payload is sent.
//!
//! # Example
//!
//! ```rust,no_run
//! use cachine::{
//!     Cachine, FsStore, ImageMagickProcessor, ImageProperties, Predicates, RequestEvent,
//!     VariantPathResolver,
//! };
//! use futures_util::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> cachine::Result<()> {
//!     let cachine = Cachine::builder::<ImageProperties>()
//!         .origin(FsStore::new("/srv/originals"))
//!         .cache(FsStore::new("/var/cache/cachine"))
//!         .resolver(VariantPathResolver)
//!         .processor(ImageMagickProcessor::new())
//!         .build()?;
//!
//!     let mut events = cachine.request(
//!         "/photos/cat.jpg",
//!         ImageProperties::new(320, 240),
//!         Predicates::default(),
//!     );
//!     while let Some(event) = events.next().await {
//!         match event? {
//!             RequestEvent::Hit(valid) => println!("caller copy current: {valid}"),
//!             RequestEvent::Meta(meta) => println!("modified: {:?}", meta.mod_time),
//!             RequestEvent::Data(chunk) => println!("{} bytes", chunk.len()),
//!             RequestEvent::End => println!("done"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod processor;
pub mod resolver;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use config::Config;
pub use error::{CachineError, Result, StoreError, StoreResult, StoreRole};
pub use orchestrator::{Cachine, CachineBuilder, Orchestrator};
pub use processor::{
    CommandTransform, IdentityProcessor, ImageMagickProcessor, Processor, Transform,
};
pub use resolver::{Resolver, VariantPathResolver};
pub use version::{BuildInfo, PKG_VERSION, user_agent, version_string};
pub use store::{ByteSink, ByteStream, FsStore, MemoryStore, RoleSink, RoleStore, Store};

#[cfg(feature = "http")]
pub use store::HttpStore;
#[cfg(feature = "s3")]
pub use store::{S3Config, S3Store};

pub use types::{
    CacheKey, ChunkStream, EventStream, ImageProperties, Meta, Predicates, RequestEvent,
    ResourceKey, StatResult,
};
