pub mod catalog;
pub mod priority;
pub mod types;

pub use catalog::{build_catalog, VoiceCatalog, VoiceMap};
pub use priority::PriorityOrder;
pub use types::{short_name_from_key, VoiceDescriptor, VoiceTag};
