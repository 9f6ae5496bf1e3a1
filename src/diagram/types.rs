use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::graph::NodeKind;
use crate::theme::Attributes;

/// Index of a [`DiagramNode`] in [`Diagram::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Index of a [`Container`] in [`Diagram::containers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub usize);

/// Either end of a diagram edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Node(NodeId),
    Container(ContainerId),
}

/// Fixed position of a node, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
}

/// A leaf entity in the diagram.
#[derive(Debug, Clone)]
pub struct DiagramNode {
    pub uuid: String,
    pub dot_id: String,
    pub kind: NodeKind,
    pub label: String,
    pub image: Option<String>,
    pub position: Option<NodePosition>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Promoted node; draws links to its children.
    Container,
    Cluster,
    Stage,
    Stack,
    NestedStack,
}

impl ContainerKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ContainerKind::Container => "container",
            ContainerKind::Cluster => "cluster",
            ContainerKind::Stage => "cluster_stage",
            ContainerKind::Stack => "cluster_stack",
            ContainerKind::NestedStack => "cluster_nstack",
        }
    }

    pub fn links_children(&self) -> bool {
        matches!(self, ContainerKind::Container)
    }
}

/// A group of nodes and nested containers, emitted as a DOT subgraph.
#[derive(Debug, Clone)]
pub struct Container {
    pub uuid: String,
    pub dot_id: String,
    pub kind: ContainerKind,
    pub label: String,
    pub attributes: Attributes,
    pub nodes: Vec<NodeId>,
    pub containers: Vec<ContainerId>,
}

impl Container {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Semantic kind of a diagram edge. Lower rank wins when parallel edges are
/// collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkKind {
    Child,
    Reference,
    Dependency,
}

impl LinkKind {
    pub fn rank(&self) -> u8 {
        match self {
            LinkKind::Child => 0,
            LinkKind::Reference => 1,
            LinkKind::Dependency => 2,
        }
    }
}

/// An edge as tracked by the builder, before endpoint resolution.
#[derive(Debug, Clone)]
pub struct DiagramEdge {
    pub id: String,
    pub kind: LinkKind,
    pub from: EntityRef,
    pub to: EntityRef,
    pub extraneous: bool,
    pub attributes: Attributes,
}

/// Invisible node anchoring a compound edge on an empty container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyntheticTarget {
    pub dot_id: String,
    pub container: ContainerId,
}

/// Concrete end of a resolved edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Uuid of the entity the edge was drawn to (container uuid if compound).
    pub uuid: String,
    /// DOT node id the layout engine attaches the edge to.
    pub node: String,
    /// Cluster boundary (`ltail` / `lhead`) for compound edges.
    pub boundary: Option<String>,
    pub synthetic: Option<SyntheticTarget>,
}

/// An edge ready for emission.
#[derive(Debug, Clone)]
pub struct ResolvedEdge {
    pub id: String,
    pub kind: LinkKind,
    pub from: Endpoint,
    pub to: Endpoint,
    pub attributes: Attributes,
    pub same_head: Vec<String>,
    pub same_tail: Vec<String>,
}

/// Root of a built diagram.
#[derive(Debug, Clone, Default)]
pub struct Diagram {
    pub title: String,
    pub attributes: Attributes,
    pub node_defaults: Attributes,
    pub edge_defaults: Attributes,
    pub nodes: Vec<DiagramNode>,
    pub containers: Vec<Container>,
    /// Top-level nodes and containers.
    pub root_nodes: Vec<NodeId>,
    pub root_containers: Vec<ContainerId>,
    /// Graph node uuid to the entity it maps to.
    pub entities: IndexMap<String, EntityRef>,
    pub edges: Vec<ResolvedEdge>,
    pub(crate) tracked_images: BTreeSet<String>,
}

impl Diagram {
    pub fn node(&self, id: NodeId) -> &DiagramNode {
        &self.nodes[id.0]
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        &self.containers[id.0]
    }

    pub fn entity(&self, uuid: &str) -> Option<EntityRef> {
        self.entities.get(uuid).copied()
    }

    pub fn uuid_of(&self, entity: EntityRef) -> &str {
        match entity {
            EntityRef::Node(id) => &self.node(id).uuid,
            EntityRef::Container(id) => &self.container(id).uuid,
        }
    }

    /// Image paths used by any node, sorted and without duplicates.
    pub fn tracked_images(&self) -> Vec<&str> {
        self.tracked_images.iter().map(String::as_str).collect()
    }

    pub fn track_image(&mut self, image: impl Into<String>) {
        self.tracked_images.insert(image.into());
    }

    /// Resolves the DOT endpoint for an edge end.
    ///
    /// Containers resolve to their first direct node, or to a synthetic node
    /// when they hold none.
    pub fn endpoint(&self, entity: EntityRef) -> Endpoint {
        match entity {
            EntityRef::Node(id) => {
                let node = self.node(id);
                Endpoint {
                    uuid: node.uuid.clone(),
                    node: node.dot_id.clone(),
                    boundary: None,
                    synthetic: None,
                }
            }
            EntityRef::Container(id) => {
                let container = self.container(id);
                let (node, synthetic) = match container.nodes.first() {
                    Some(first) => (self.node(*first).dot_id.clone(), None),
                    None => {
                        let dot_id = format!("synthetic_{}", container.dot_id);
                        let synthetic = SyntheticTarget {
                            dot_id: dot_id.clone(),
                            container: id,
                        };
                        (dot_id, Some(synthetic))
                    }
                };
                Endpoint {
                    uuid: container.uuid.clone(),
                    node,
                    boundary: Some(container.dot_id.clone()),
                    synthetic,
                }
            }
        }
    }
}
