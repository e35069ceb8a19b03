//! Resource store
//!
//! Everything the harness knows about the server's state. Resources are held
//! per kind in insertion order; parents are referenced by [`StoredResourceId`]
//! and resolved through the store rather than by pointer. Annotations (aliases
//! and tags) live in a side table keyed by id so payloads stay untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{HarnessError, Result};
use crate::resource::graph::ResourceTypeGraph;
use crate::resource::kind::ResourceKind;
use crate::resource::payload::Resource;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdSegment {
    Href(String),
    /// Stands in for a missing href so hrefless resources stay distinct
    Local(Uuid),
}

/// Value identity of a stored resource: the owning parent chain plus the
/// resource's own href.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredResourceId {
    segments: Arc<[IdSegment]>,
}

impl StoredResourceId {
    pub fn new(parent: Option<&StoredResourceId>, href: Option<&str>) -> Self {
        let own = match href.filter(|h| !h.is_empty()) {
            Some(href) => IdSegment::Href(href.to_string()),
            None => IdSegment::Local(Uuid::new_v4()),
        };
        let mut segments = parent.map(|p| p.segments.to_vec()).unwrap_or_default();
        segments.push(own);
        Self {
            segments: segments.into(),
        }
    }

    /// Id of the owning parent, None for parentless resources
    pub fn parent_id(&self) -> Option<StoredResourceId> {
        match self.segments.len() {
            0 | 1 => None,
            n => Some(Self {
                segments: self.segments[..n - 1].into(),
            }),
        }
    }

    /// The resource's own href, None if it was stored without one
    pub fn href(&self) -> Option<&str> {
        match self.segments.last() {
            Some(IdSegment::Href(href)) => Some(href),
            _ => None,
        }
    }

    /// True if `ancestor` appears strictly above this id in its parent chain
    pub fn is_descendant_of(&self, ancestor: &StoredResourceId) -> bool {
        self.segments.len() > ancestor.segments.len() && self.segments.starts_with(&ancestor.segments)
    }
}

impl std::fmt::Display for StoredResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, " > ")?;
            }
            match segment {
                IdSegment::Href(href) => write!(f, "{href}")?,
                IdSegment::Local(id) => write!(f, "#{}", &id.simple().to_string()[..8])?,
            }
        }
        Ok(())
    }
}

/// One known resource instance
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResource {
    pub id: StoredResourceId,
    pub resource_type: ResourceKind,
    pub parent: Option<StoredResourceId>,
    pub resource: Arc<Resource>,
    /// Set when this resource was discovered as a member of a list
    pub member_of_list: Option<ResourceKind>,
    /// Child link hrefs present on the payload
    pub resource_link_hrefs: BTreeMap<ResourceKind, String>,
    pub created_at: DateTime<Utc>,
}

impl StoredResource {
    pub fn href(&self) -> Option<&str> {
        self.resource.href()
    }

    pub fn link_href(&self, kind: ResourceKind) -> Option<&str> {
        self.resource_link_hrefs.get(&kind).map(String::as_str)
    }
}

/// Namespace of a resource tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotationNamespace {
    /// Tags are subscription ids whose notifications delivered this resource
    SubscriptionReceived,
    Custom(String),
}

/// Out-of-band annotations attached to a stored resource id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceAnnotations {
    pub alias: Option<String>,
    tag_creations: BTreeMap<AnnotationNamespace, BTreeMap<String, DateTime<Utc>>>,
}

impl ResourceAnnotations {
    /// Set the alias. Setting the same alias again is fine, a different one is not.
    pub fn set_alias(&mut self, alias: impl Into<String>) -> Result<()> {
        let alias = alias.into();
        match &self.alias {
            Some(existing) if *existing != alias => Err(HarnessError::precondition(format!(
                "resource already aliased '{existing}', refusing '{alias}'"
            ))),
            _ => {
                self.alias = Some(alias);
                Ok(())
            }
        }
    }

    /// Add a tag, keeping the creation time of the first add
    pub fn add_tag(&mut self, namespace: AnnotationNamespace, tag: impl Into<String>) {
        self.tag_creations
            .entry(namespace)
            .or_default()
            .entry(tag.into())
            .or_insert_with(Utc::now);
    }

    pub fn has_tag(&self, namespace: &AnnotationNamespace, tag: &str) -> bool {
        self.tag_creations
            .get(namespace)
            .is_some_and(|tags| tags.contains_key(tag))
    }

    pub fn tags(&self, namespace: &AnnotationNamespace) -> impl Iterator<Item = &str> {
        self.tag_creations
            .get(namespace)
            .into_iter()
            .flat_map(|tags| tags.keys().map(String::as_str))
    }

    pub fn tag_created_at(&self, namespace: &AnnotationNamespace, tag: &str) -> Option<DateTime<Utc>> {
        self.tag_creations.get(namespace)?.get(tag).copied()
    }
}

/// Per-kind ordered store of discovered resources
#[derive(Debug, Clone)]
pub struct ResourceStore {
    graph: Arc<ResourceTypeGraph>,
    buckets: HashMap<ResourceKind, Vec<StoredResource>>,
    annotations: HashMap<StoredResourceId, ResourceAnnotations>,
}

impl ResourceStore {
    pub fn new(graph: Arc<ResourceTypeGraph>) -> Self {
        Self {
            graph,
            buckets: HashMap::new(),
            annotations: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &ResourceTypeGraph {
        &self.graph
    }

    fn build(&self, kind: ResourceKind, parent: Option<&StoredResourceId>, resource: Resource) -> StoredResource {
        StoredResource {
            id: StoredResourceId::new(parent, resource.href()),
            resource_type: kind,
            parent: parent.cloned(),
            member_of_list: self.graph.member_of_list(kind),
            resource_link_hrefs: self.graph.child_link_hrefs(kind, &resource),
            resource: Arc::new(resource),
            created_at: Utc::now(),
        }
    }

    /// Replace the whole bucket for `kind` with this one resource
    pub fn set_resource(
        &mut self,
        kind: ResourceKind,
        parent: Option<&StoredResourceId>,
        resource: Resource,
    ) -> StoredResource {
        let stored = self.build(kind, parent, resource);
        self.buckets.insert(kind, vec![stored.clone()]);
        stored
    }

    /// Add to the end of the bucket for `kind`
    pub fn append_resource(
        &mut self,
        kind: ResourceKind,
        parent: Option<&StoredResourceId>,
        resource: Resource,
    ) -> StoredResource {
        let stored = self.build(kind, parent, resource);
        self.buckets.entry(kind).or_default().push(stored.clone());
        stored
    }

    /// Replace in place if a resource with the same (parent, href) identity is
    /// already stored, otherwise append.
    pub fn upsert_resource(
        &mut self,
        kind: ResourceKind,
        parent: Option<&StoredResourceId>,
        resource: Resource,
    ) -> StoredResource {
        let stored = self.build(kind, parent, resource);
        let bucket = self.buckets.entry(kind).or_default();
        match bucket.iter_mut().find(|existing| existing.id == stored.id) {
            Some(existing) => *existing = stored.clone(),
            None => bucket.push(stored.clone()),
        }
        stored
    }

    /// Stored resources of `kind` in insertion order. Empty if none are known.
    pub fn get(&self, kind: ResourceKind) -> &[StoredResource] {
        self.buckets.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get_by_id(&self, id: &StoredResourceId) -> Option<&StoredResource> {
        self.buckets.values().flatten().find(|sr| sr.id == *id)
    }

    /// Stored resources of `kind` paired with their hrefs, skipping hrefless ones
    pub fn hrefs(&self, kind: ResourceKind) -> impl Iterator<Item = (&StoredResource, &str)> {
        self.get(kind).iter().filter_map(|sr| sr.href().map(|href| (sr, href)))
    }

    pub fn clear_resource(&mut self, kind: ResourceKind) {
        self.buckets.remove(&kind);
    }

    /// Drop every resource and annotation
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.annotations.clear();
    }

    /// Remove every entry with this id. Returns true if anything was removed.
    pub fn delete_resource(&mut self, id: &StoredResourceId) -> bool {
        let mut removed = false;
        for bucket in self.buckets.values_mut() {
            let before = bucket.len();
            bucket.retain(|sr| sr.id != *id);
            removed |= bucket.len() != before;
        }
        removed
    }

    /// Nearest resource of `kind` above `id` in its parent chain
    pub fn ancestor_of(&self, kind: ResourceKind, id: &StoredResourceId) -> Option<&StoredResource> {
        let bucket = self.get(kind);
        let mut current = id.parent_id();
        while let Some(candidate) = current {
            if let Some(found) = bucket.iter().find(|sr| sr.id == candidate) {
                return Some(found);
            }
            current = candidate.parent_id();
        }
        None
    }

    /// Resources of `kind` whose parent chain passes through `id`, in store order
    pub fn descendants_of(&self, kind: ResourceKind, id: &StoredResourceId) -> Vec<&StoredResource> {
        self.get(kind)
            .iter()
            .filter(|sr| sr.id.is_descendant_of(id))
            .collect()
    }

    /// Annotations for `id`, created on first access
    pub fn resource_annotations(&mut self, id: &StoredResourceId) -> &mut ResourceAnnotations {
        self.annotations.entry(id.clone()).or_default()
    }

    /// Read-only view of the annotations for `id`, if any were ever created
    pub fn annotations(&self, id: &StoredResourceId) -> Option<&ResourceAnnotations> {
        self.annotations.get(id)
    }

    /// Find a stored resource of `kind` by its alias
    pub fn get_by_alias(&self, kind: ResourceKind, alias: &str) -> Option<&StoredResource> {
        self.get(kind).iter().find(|sr| {
            self.annotations
                .get(&sr.id)
                .and_then(|a| a.alias.as_deref())
                == Some(alias)
        })
    }

    /// Number of stored resources per non-empty kind
    pub fn counts(&self) -> BTreeMap<ResourceKind, usize> {
        self.buckets
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(kind, bucket)| (*kind, bucket.len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
