//! Resource kinds, the type graph and the resource store

pub mod graph;
pub mod kind;
pub mod payload;
pub mod store;

pub use graph::{ResourceDescriptor, ResourceTypeGraph, CSIP_AUS_RESOURCES};
pub use kind::ResourceKind;
pub use payload::{ListPage, Resource};
pub use store::{AnnotationNamespace, ResourceAnnotations, ResourceStore, StoredResource, StoredResourceId};
