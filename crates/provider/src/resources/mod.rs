//! Resource Implementations
//!
//! One strategy per remote resource type, driven by the generic reconciler.

pub mod bucket;
pub mod image;
pub mod instance;
pub mod object_storage;
pub mod private_network;
pub mod secret;
pub mod snapshot;
pub mod tag;
pub mod tag_assignment;

use std::collections::HashMap;

use crate::reconciler::{ManagedResource, Reconciler};

pub use bucket::BucketResource;
pub use image::ImageResource;
pub use instance::InstanceResource;
pub use object_storage::ObjectStorageResource;
pub use private_network::PrivateNetworkResource;
pub use secret::SecretResource;
pub use snapshot::SnapshotResource;
pub use tag::TagResource;
pub use tag_assignment::TagAssignmentResource;

/// Every supported resource type, keyed by type name
pub fn registry() -> HashMap<&'static str, Box<dyn ManagedResource>> {
    let resources: Vec<Box<dyn ManagedResource>> = vec![
        Box::new(Reconciler::new(InstanceResource)),
        Box::new(Reconciler::new(SnapshotResource)),
        Box::new(Reconciler::new(ImageResource)),
        Box::new(Reconciler::new(ObjectStorageResource)),
        Box::new(Reconciler::new(BucketResource)),
        Box::new(Reconciler::new(SecretResource)),
        Box::new(Reconciler::new(PrivateNetworkResource)),
        Box::new(Reconciler::new(TagResource)),
        Box::new(Reconciler::new(TagAssignmentResource)),
    ];
    resources.into_iter().map(|r| (r.type_name(), r)).collect()
}
