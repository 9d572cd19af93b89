//! Pagepress external collaborators.
//!
//! Everything that leaves the process lives here: the content generation
//! service, the publish destinations (key-addressed object storage), and
//! the search-engine indexing notifier. All HTTP traffic flows through one
//! `reqwest::Client` handle constructed by the caller and passed in
//! explicitly — no module-level singletons.

pub mod destination;
pub mod error;
pub mod fakes;
pub mod generate;
pub mod notify;
pub mod publisher;

pub use destination::{
    BucketConfig, BucketDestination, Destination, StorageZoneConfig, StorageZoneDestination,
};
pub use error::{RemoteError, RemoteResult};
pub use generate::{ContentGenerator, GeneratorConfig, HttpGenerator, MAX_BATCH_RETRIES};
pub use notify::{ChangeKind, IndexingConfig, IndexingNotifier};
pub use publisher::Publisher;
