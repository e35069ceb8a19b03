//! Resource type graph
//!
//! A static tree of resource kinds rooted at DeviceCapability. Each kind has a
//! descriptor naming its parent, whether it is a list container, and which
//! link element on the parent payload points at it. The graph is built once
//! per run and handed around as an immutable value.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{GraphError, HarnessError, Result};
use crate::resource::kind::ResourceKind;
use crate::resource::kind::ResourceKind as K;
use crate::resource::payload::Resource;

/// Static description of where a kind sits in the resource tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub parent: Option<ResourceKind>,
    /// Container whose members are a different kind, fetched by pagination
    pub is_list: bool,
    /// Link element on the parent payload. None for list members.
    pub link: Option<&'static str>,
}

const fn root(kind: ResourceKind) -> ResourceDescriptor {
    ResourceDescriptor {
        kind,
        parent: None,
        is_list: false,
        link: None,
    }
}

const fn linked(kind: ResourceKind, parent: ResourceKind, link: &'static str) -> ResourceDescriptor {
    ResourceDescriptor {
        kind,
        parent: Some(parent),
        is_list: false,
        link: Some(link),
    }
}

const fn list(kind: ResourceKind, parent: ResourceKind, link: &'static str) -> ResourceDescriptor {
    ResourceDescriptor {
        kind,
        parent: Some(parent),
        is_list: true,
        link: Some(link),
    }
}

const fn member(kind: ResourceKind, list: ResourceKind) -> ResourceDescriptor {
    ResourceDescriptor {
        kind,
        parent: Some(list),
        is_list: false,
        link: None,
    }
}

/// The CSIP-Aus resource tree
pub const CSIP_AUS_RESOURCES: &[ResourceDescriptor] = &[
    root(K::DeviceCapability),
    linked(K::Time, K::DeviceCapability, "TimeLink"),
    list(K::MirrorUsagePointList, K::DeviceCapability, "MirrorUsagePointListLink"),
    list(K::EndDeviceList, K::DeviceCapability, "EndDeviceListLink"),
    member(K::MirrorUsagePoint, K::MirrorUsagePointList),
    list(K::MirrorMeterReadingList, K::MirrorUsagePoint, "MirrorMeterReadingListLink"),
    member(K::MirrorMeterReading, K::MirrorMeterReadingList),
    member(K::EndDevice, K::EndDeviceList),
    linked(K::ConnectionPoint, K::EndDevice, "ConnectionPointLink"),
    linked(K::Registration, K::EndDevice, "RegistrationLink"),
    list(K::FunctionSetAssignmentsList, K::EndDevice, "FunctionSetAssignmentsListLink"),
    list(K::DERList, K::EndDevice, "DERListLink"),
    list(K::SubscriptionList, K::EndDevice, "SubscriptionListLink"),
    list(K::LogEventList, K::EndDevice, "LogEventListLink"),
    member(K::FunctionSetAssignments, K::FunctionSetAssignmentsList),
    list(K::DERProgramList, K::FunctionSetAssignments, "DERProgramListLink"),
    member(K::DERProgram, K::DERProgramList),
    linked(K::DefaultDERControl, K::DERProgram, "DefaultDERControlLink"),
    list(K::DERControlList, K::DERProgram, "DERControlListLink"),
    list(K::DERCurveList, K::DERProgram, "DERCurveListLink"),
    member(K::DERControl, K::DERControlList),
    member(K::DERCurve, K::DERCurveList),
    member(K::DER, K::DERList),
    linked(K::DERCapability, K::DER, "DERCapabilityLink"),
    linked(K::DERSettings, K::DER, "DERSettingsLink"),
    linked(K::DERStatus, K::DER, "DERStatusLink"),
    linked(K::DERAvailability, K::DER, "DERAvailabilityLink"),
    member(K::Subscription, K::SubscriptionList),
    member(K::LogEvent, K::LogEventList),
];

/// Immutable tree of resource kinds
#[derive(Debug, Clone)]
pub struct ResourceTypeGraph {
    root: ResourceKind,
    descriptors: HashMap<ResourceKind, ResourceDescriptor>,
    children: HashMap<ResourceKind, Vec<ResourceKind>>,
}

impl ResourceTypeGraph {
    /// Graph over the built-in CSIP-Aus table.
    ///
    /// # Panics
    /// If the built-in table is malformed. That is a programming error and
    /// is covered by the unit tests below.
    pub fn new() -> Self {
        match Self::from_descriptors(CSIP_AUS_RESOURCES) {
            Ok(graph) => graph,
            Err(e) => panic!("built-in resource table is malformed: {e}"),
        }
    }

    /// Build from an arbitrary table, verifying that every kind appears exactly
    /// once and hangs off a single root.
    pub fn from_descriptors(table: &[ResourceDescriptor]) -> Result<Self, GraphError> {
        let mut descriptors = HashMap::new();
        let mut children: HashMap<ResourceKind, Vec<ResourceKind>> = HashMap::new();
        let mut root = None;

        for d in table {
            if descriptors.insert(d.kind, *d).is_some() {
                return Err(GraphError::DuplicateKind(d.kind.to_string()));
            }
            match d.parent {
                Some(parent) => children.entry(parent).or_default().push(d.kind),
                None if root.is_some() => return Err(GraphError::MultipleRoots(d.kind.to_string())),
                None => root = Some(d.kind),
            }
        }

        for kind in ResourceKind::ALL {
            if !descriptors.contains_key(&kind) {
                return Err(GraphError::MissingKind(kind.to_string()));
            }
        }
        let root = root.ok_or_else(|| GraphError::Unreachable(ResourceKind::DeviceCapability.to_string()))?;

        // Every parent chain must terminate at the root within |kinds| hops
        for kind in ResourceKind::ALL {
            let mut current = kind;
            let mut hops = 0;
            while let Some(parent) = descriptors.get(&current).and_then(|d| d.parent) {
                hops += 1;
                if hops > descriptors.len() {
                    return Err(GraphError::Unreachable(kind.to_string()));
                }
                current = parent;
            }
            if current != root {
                return Err(GraphError::Unreachable(kind.to_string()));
            }
        }

        Ok(Self {
            root,
            descriptors,
            children,
        })
    }

    pub fn root(&self) -> ResourceKind {
        self.root
    }

    pub fn descriptor(&self, kind: ResourceKind) -> Result<&ResourceDescriptor> {
        self.descriptors
            .get(&kind)
            .ok_or_else(|| HarnessError::InvalidResourceKind(kind.to_string()))
    }

    /// Parent kind, None only for the root
    pub fn parent_of(&self, kind: ResourceKind) -> Option<ResourceKind> {
        self.descriptors.get(&kind).and_then(|d| d.parent)
    }

    pub fn is_list_kind(&self, kind: ResourceKind) -> bool {
        self.descriptors.get(&kind).is_some_and(|d| d.is_list)
    }

    /// Link element on the parent payload that points at `kind`
    pub fn link_name(&self, kind: ResourceKind) -> Option<&'static str> {
        self.descriptors.get(&kind).and_then(|d| d.link)
    }

    /// Direct children in table order
    pub fn children_of(&self, kind: ResourceKind) -> &[ResourceKind] {
        self.children.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Member kind of a list kind (eg EndDeviceList -> EndDevice)
    pub fn list_member_of(&self, kind: ResourceKind) -> Option<ResourceKind> {
        if !self.is_list_kind(kind) {
            return None;
        }
        self.children_of(kind)
            .iter()
            .copied()
            .find(|child| self.link_name(*child).is_none())
    }

    /// The list kind that `kind` instances are members of, if any
    pub fn member_of_list(&self, kind: ResourceKind) -> Option<ResourceKind> {
        self.parent_of(kind).filter(|parent| self.is_list_kind(*parent))
    }

    /// Kinds from the root down to and including `kind`
    pub fn path_from_root(&self, kind: ResourceKind) -> Result<Vec<ResourceKind>> {
        let mut path = vec![kind];
        let mut current = self.descriptor(kind)?;
        while let Some(parent) = current.parent {
            path.push(parent);
            current = self.descriptor(parent)?;
        }
        path.reverse();
        Ok(path)
    }

    /// Ordered, de-duplicated kinds that must be fetched (root first) to reach
    /// every target. First-seen order wins.
    pub fn discovery_plan(&self, targets: &[ResourceKind]) -> Result<Vec<ResourceKind>> {
        let mut plan = Vec::new();
        let mut visited = HashSet::new();
        for target in targets {
            for kind in self.path_from_root(*target)? {
                if visited.insert(kind) {
                    plan.push(kind);
                }
            }
        }
        Ok(plan)
    }

    /// Pre-extract hrefs of every child link present on a payload of `kind`
    pub fn child_link_hrefs(&self, kind: ResourceKind, payload: &Resource) -> BTreeMap<ResourceKind, String> {
        self.children_of(kind)
            .iter()
            .filter_map(|child| {
                let link = self.link_name(*child)?;
                payload.link(link).map(|href| (*child, href.to_string()))
            })
            .collect()
    }
}

impl Default for ResourceTypeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_builtin_table_is_well_formed() {
        let graph = ResourceTypeGraph::new();
        assert_eq!(graph.root(), K::DeviceCapability);
        for kind in ResourceKind::ALL {
            if kind != K::DeviceCapability {
                assert!(graph.parent_of(kind).is_some(), "{kind} has no parent");
            }
        }
    }

    #[test]
    fn test_parent_of() {
        let graph = ResourceTypeGraph::new();
        assert_eq!(graph.parent_of(K::DeviceCapability), None);
        assert_eq!(graph.parent_of(K::EndDeviceList), Some(K::DeviceCapability));
        assert_eq!(graph.parent_of(K::EndDevice), Some(K::EndDeviceList));
        assert_eq!(graph.parent_of(K::DERSettings), Some(K::DER));
        assert_eq!(graph.parent_of(K::Subscription), Some(K::SubscriptionList));
    }

    #[test]
    fn test_list_kinds() {
        let graph = ResourceTypeGraph::new();
        assert!(graph.is_list_kind(K::EndDeviceList));
        assert!(graph.is_list_kind(K::DERControlList));
        assert!(!graph.is_list_kind(K::EndDevice));
        assert!(!graph.is_list_kind(K::DeviceCapability));

        assert_eq!(graph.list_member_of(K::EndDeviceList), Some(K::EndDevice));
        assert_eq!(graph.list_member_of(K::DERProgramList), Some(K::DERProgram));
        assert_eq!(graph.list_member_of(K::DER), None);

        assert_eq!(graph.member_of_list(K::DER), Some(K::DERList));
        assert_eq!(graph.member_of_list(K::DERSettings), None);
    }

    #[test]
    fn test_discovery_plan() {
        let graph = ResourceTypeGraph::new();
        let edev_chain = vec![
            K::DeviceCapability,
            K::EndDeviceList,
            K::EndDevice,
            K::DERList,
            K::DER,
            K::DERSettings,
        ];

        assert_eq!(graph.discovery_plan(&[]).unwrap(), vec![]);
        assert_eq!(graph.discovery_plan(&[K::Time]).unwrap(), vec![K::DeviceCapability, K::Time]);
        assert_eq!(
            graph.discovery_plan(&[K::Time, K::Time]).unwrap(),
            vec![K::DeviceCapability, K::Time]
        );
        assert_eq!(graph.discovery_plan(&[K::DERSettings]).unwrap(), edev_chain);

        let mut expected = edev_chain.clone();
        expected.push(K::Time);
        assert_eq!(graph.discovery_plan(&[K::DERSettings, K::Time]).unwrap(), expected);

        expected.extend([K::FunctionSetAssignmentsList, K::FunctionSetAssignments, K::DERProgramList, K::DERCapability]);
        assert_eq!(
            graph
                .discovery_plan(&[K::DERSettings, K::Time, K::DERProgramList, K::DERCapability])
                .unwrap(),
            expected
        );
    }

    #[test]
    fn test_child_link_hrefs() {
        let graph = ResourceTypeGraph::new();
        let der = Resource::new("/der/1")
            .with_link("DERSettingsLink", "/der/1/set")
            .with_link("DERCapabilityLink", "/der/1/cap")
            .with_link("DERStatusLink", "")
            .with_link("SomethingElseLink", "/other");

        let hrefs = graph.child_link_hrefs(K::DER, &der);
        assert_eq!(hrefs.len(), 2);
        assert_eq!(hrefs.get(&K::DERSettings).map(String::as_str), Some("/der/1/set"));
        assert_eq!(hrefs.get(&K::DERCapability).map(String::as_str), Some("/der/1/cap"));

        // List members are never link targets
        let list = Resource::new("/edev").with_link("EndDeviceLink", "/edev/1");
        assert!(graph.child_link_hrefs(K::EndDeviceList, &list).is_empty());
    }

    #[test]
    fn test_malformed_tables_rejected() {
        let missing = &CSIP_AUS_RESOURCES[..CSIP_AUS_RESOURCES.len() - 1];
        assert_eq!(
            ResourceTypeGraph::from_descriptors(missing).unwrap_err(),
            GraphError::MissingKind("LogEvent".to_string())
        );

        let mut duplicated = CSIP_AUS_RESOURCES.to_vec();
        duplicated.push(member(K::LogEvent, K::LogEventList));
        assert_eq!(
            ResourceTypeGraph::from_descriptors(&duplicated).unwrap_err(),
            GraphError::DuplicateKind("LogEvent".to_string())
        );

        let mut two_roots = CSIP_AUS_RESOURCES.to_vec();
        let time = two_roots.iter_mut().find(|d| d.kind == K::Time).unwrap();
        *time = root(K::Time);
        assert_eq!(
            ResourceTypeGraph::from_descriptors(&two_roots).unwrap_err(),
            GraphError::MultipleRoots("Time".to_string())
        );

        let mut cyclic = CSIP_AUS_RESOURCES.to_vec();
        let edev = cyclic.iter_mut().find(|d| d.kind == K::EndDeviceList).unwrap();
        *edev = list(K::EndDeviceList, K::EndDevice, "EndDeviceListLink");
        assert_eq!(
            ResourceTypeGraph::from_descriptors(&cyclic).unwrap_err(),
            GraphError::Unreachable("EndDeviceList".to_string())
        );
    }

    fn arb_kind() -> impl Strategy<Value = ResourceKind> {
        (0..ResourceKind::ALL.len()).prop_map(|i| ResourceKind::ALL[i])
    }

    proptest! {
        #[test]
        fn prop_plan_is_deduplicated_and_ancestor_ordered(targets in prop::collection::vec(arb_kind(), 0..12)) {
            let graph = ResourceTypeGraph::new();
            let plan = graph.discovery_plan(&targets).unwrap();

            let unique: HashSet<_> = plan.iter().collect();
            prop_assert_eq!(unique.len(), plan.len());

            for (i, kind) in plan.iter().enumerate() {
                if let Some(parent) = graph.parent_of(*kind) {
                    let parent_pos = plan.iter().position(|k| *k == parent);
                    prop_assert!(matches!(parent_pos, Some(p) if p < i));
                }
            }
            for target in &targets {
                prop_assert!(plan.contains(target));
            }
        }

        #[test]
        fn prop_plan_ignores_repeated_targets(targets in prop::collection::vec(arb_kind(), 0..12)) {
            let graph = ResourceTypeGraph::new();
            let mut seen = HashSet::new();
            let deduped: Vec<_> = targets.iter().copied().filter(|k| seen.insert(*k)).collect();

            let plan = graph.discovery_plan(&targets).unwrap();
            prop_assert_eq!(&plan, &graph.discovery_plan(&deduped).unwrap());
            prop_assert_eq!(&plan, &graph.discovery_plan(&targets).unwrap());
        }
    }
}
