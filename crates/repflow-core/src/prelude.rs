//! Convenient re-exports for downstream crates.

pub use crate::config::{ConsumptionPolicy, ContextConfig};
pub use crate::error::{Error, Result};
pub use crate::id::NodeId;
pub use crate::manifest::{ManifestId, RunManifest};
pub use crate::object::{object_id, DataObject, ObjectRef, Value};
pub use crate::signature::{Requirement, Signature};
pub use crate::tag::{tag_set, Tag, TagSet};
pub use crate::types::{Params, Scalar};
