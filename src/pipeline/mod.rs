//! Service-message refinement pipeline.
//!
//! Decoded chains flow through:
//! 1. `VariantRegistry::recognize()`: shape sniffing of service messages
//! 2. `Refinable::refine()`: markup extraction plus the downloader fetch
//! 3. `RefineEngine`: in-place substitution, rescanning until stable
//!
//! Every resolved payload is preceded by a `MessageOrigin` so the original
//! envelope can be re-sent verbatim.

pub mod downloader;
pub mod engine;
pub mod markup;
pub mod registry;
pub mod types;
pub mod variants;

pub use downloader::DirectoryDownloader;
pub use engine::{RefineEngine, RefineOutcome};
pub use registry::{VariantEntry, VariantRegistry};
pub use types::{
    ForwardMessage, ForwardNode, MessageChain, MessageElement, MessageOrigin, OriginKind,
    ResourceDownloader, ResourceId, ServiceMessage,
};
pub use variants::{ForwardMessagePending, LongMessagePending, Refinable};
