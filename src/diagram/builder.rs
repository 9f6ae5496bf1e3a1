use std::collections::HashMap;

use log::{debug, info, trace, warn};
use regex::Regex;

use super::edges::EdgeResolver;
use super::images::{ImageResolver, icon_range, resolve_image};
use super::label::{LABEL_LINE_HEIGHT, marshall_label};
use super::types::{
    Container, ContainerId, ContainerKind, Diagram, DiagramEdge, DiagramNode, EntityRef,
    LinkKind, NodeId, NodePosition,
};
use crate::error::DiagramError;
use crate::graph::{EdgeKind, GraphNode, NodeKind, Store};
use crate::theme::{Attributes, GraphTheme, StageSelection, apply, attributes};

/// Deepest node nesting the builder will follow.
pub const MAX_DEPTH: usize = 256;

pub const DEFAULT_TITLE: &str = "Cloud Diagram";

#[derive(Debug, Clone)]
pub struct DiagramOptions {
    pub title: String,
    /// Keep one edge per endpoint pair and drop extraneous edges.
    pub compact: bool,
    /// Fixed positions keyed by construct id.
    pub node_positions: HashMap<String, NodePosition>,
    /// Directory the layout engine resolves relative image paths against.
    pub imagepath: Option<String>,
}

impl Default for DiagramOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            compact: true,
            node_positions: HashMap::new(),
            imagepath: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Parent {
    Root,
    Container(ContainerId),
}

/// How a graph node is represented before its children are known.
enum Candidate {
    Node,
    Container(ContainerKind),
}

fn candidate_for(node: &GraphNode) -> Candidate {
    match node.kind {
        NodeKind::Resource | NodeKind::CfnResource => Candidate::Node,
        NodeKind::NestedStack => Candidate::Container(ContainerKind::NestedStack),
        NodeKind::Stack => Candidate::Container(ContainerKind::Stack),
        NodeKind::Stage => Candidate::Container(ContainerKind::Stage),
        NodeKind::Default if node.is_leaf() => Candidate::Node,
        NodeKind::Default => Candidate::Container(ContainerKind::Cluster),
    }
}

struct Builder<'a> {
    theme: &'a GraphTheme,
    images: &'a dyn ImageResolver,
    options: &'a DiagramOptions,
    diagram: Diagram,
    edges: EdgeResolver,
}

impl<'a> Builder<'a> {
    fn new(theme: &'a GraphTheme, images: &'a dyn ImageResolver, options: &'a DiagramOptions) -> Self {
        let mut graph = theme.graph.clone();
        graph.insert("label".into(), options.title.clone());
        if let Some(imagepath) = &options.imagepath {
            graph.insert("imagepath".into(), imagepath.clone());
        }

        let diagram = Diagram {
            title: options.title.clone(),
            attributes: graph,
            node_defaults: theme.node.clone(),
            edge_defaults: theme.edge.clone(),
            ..Diagram::default()
        };

        Self {
            theme,
            images,
            options,
            diagram,
            edges: EdgeResolver::new(),
        }
    }

    fn visit(&mut self, node: &GraphNode, parent: Parent, depth: usize) -> Result<(), DiagramError> {
        if node.destroyed {
            return Ok(());
        }
        if depth > MAX_DEPTH {
            return Err(DiagramError::DepthExceeded {
                uuid: node.uuid.clone(),
                limit: MAX_DEPTH,
            });
        }

        match (candidate_for(node), node.is_leaf()) {
            (_, true) => {
                let id = self.push_node(node);
                self.register(EntityRef::Node(id), &node.uuid, parent);
                Ok(())
            }
            (Candidate::Node, false) => {
                let inner = self.push_node(node);
                let container = self.push_container(node, ContainerKind::Container);
                self.diagram.containers[container.0].nodes.push(inner);
                self.register(EntityRef::Container(container), &node.uuid, parent);
                self.visit_children(node, container, depth)
            }
            (Candidate::Container(kind), false) => self.visit_container(node, kind, parent, depth),
        }
    }

    fn visit_container(
        &mut self,
        node: &GraphNode,
        kind: ContainerKind,
        parent: Parent,
        depth: usize,
    ) -> Result<(), DiagramError> {
        let container = self.push_container(node, kind);
        self.register(EntityRef::Container(container), &node.uuid, parent);
        self.visit_children(node, container, depth)
    }

    fn visit_children(&mut self, node: &GraphNode, container: ContainerId, depth: usize) -> Result<(), DiagramError> {
        for child in &node.children {
            self.visit(child, Parent::Container(container), depth + 1)?;
        }
        Ok(())
    }

    /// Attaches an entity to its parent and records it by uuid. Containers
    /// that link their children get a structural edge right away.
    fn register(&mut self, entity: EntityRef, uuid: &str, parent: Parent) {
        match (parent, entity) {
            (Parent::Root, EntityRef::Node(id)) => self.diagram.root_nodes.push(id),
            (Parent::Root, EntityRef::Container(id)) => self.diagram.root_containers.push(id),
            (Parent::Container(p), EntityRef::Node(id)) => self.diagram.containers[p.0].nodes.push(id),
            (Parent::Container(p), EntityRef::Container(id)) => {
                self.diagram.containers[p.0].containers.push(id)
            }
        }
        self.diagram.entities.insert(uuid.to_string(), entity);

        if let Parent::Container(p) = parent {
            let container = &self.diagram.containers[p.0];
            if container.kind.links_children() {
                let edge = DiagramEdge {
                    id: format!("link_{}_{}", container.uuid, uuid),
                    kind: LinkKind::Child,
                    from: EntityRef::Container(p),
                    to: entity,
                    extraneous: false,
                    attributes: self.theme.child_link.clone(),
                };
                self.edges.track(&self.diagram, edge);
            }
        }
    }

    fn push_container(&mut self, node: &GraphNode, kind: ContainerKind) -> ContainerId {
        let mut attrs = self.theme.subgraph.clone();
        attrs.insert("label".into(), node.id.clone());
        match kind {
            ContainerKind::Container => {
                attrs.insert("style".into(), "rounded,dashed".into());
            }
            ContainerKind::Cluster => apply(&mut attrs, &self.theme.cluster),
            ContainerKind::Stage => {
                apply(&mut attrs, &self.theme.cluster);
                apply(&mut attrs, &self.theme.stage);
            }
            ContainerKind::Stack => {
                apply(&mut attrs, &self.theme.cluster);
                apply(&mut attrs, &self.theme.stack);
            }
            ContainerKind::NestedStack => {
                apply(&mut attrs, &self.theme.cluster);
                apply(&mut attrs, &self.theme.stack);
                apply(&mut attrs, &self.theme.nested_stack);
            }
        }

        let id = ContainerId(self.diagram.containers.len());
        self.diagram.containers.push(Container {
            uuid: node.uuid.clone(),
            dot_id: format!("{}_{}", kind.prefix(), node.uuid),
            kind,
            label: node.id.clone(),
            attributes: attrs,
            nodes: Vec::new(),
            containers: Vec::new(),
        });
        id
    }

    fn push_node(&mut self, node: &GraphNode) -> NodeId {
        let label = marshall_label(&node.id);
        let mut attrs = Attributes::new();
        attrs.insert("label".into(), label.label.clone());
        let comment = match &node.cfn_type {
            Some(cfn_type) => format!("nodeType:{}({})", node.kind.as_str(), cfn_type),
            None => format!("nodeType:{}", node.kind.as_str()),
        };
        attrs.insert("comment".into(), comment);

        let theme = self.theme;
        let mut image = None;
        if let Some((min, max)) = icon_range(node, &theme.rendering) {
            image = resolve_image(self.images, node, min, max);
            let role = match node.kind {
                NodeKind::CfnResource => &theme.cfn_resource_node,
                _ => &theme.resource_node,
            };
            if let Some(path) = &image {
                apply(&mut attrs, &theme.image_node);
                attrs.insert("image".into(), path.clone());
                self.diagram.track_image(path.clone());
            }
            apply(&mut attrs, role);

            let base_height = role
                .get("height")
                .and_then(|h| h.parse::<f64>().ok())
                .unwrap_or(1.0);
            if image.is_some() {
                let height = base_height + label.lines as f64 * LABEL_LINE_HEIGHT;
                attrs.insert("labelloc".into(), "b".into());
                attrs.insert("height".into(), format_inches(height));
            } else {
                attrs.insert("labelloc".into(), "c".into());
                attrs.insert("penwidth".into(), "0.25".into());
                attrs.insert("height".into(), format_inches(base_height));
            }

            if node.kind == NodeKind::CfnResource && node.imported {
                let tertiary = theme.tertiary_text();
                let color = format!("{tertiary}33");
                let fillcolor = format!("{tertiary}1A");
                apply(
                    &mut attrs,
                    &attributes(&[
                        ("style", "filled,dotted"),
                        ("penwidth", "1"),
                        ("fontcolor", tertiary),
                        ("color", color.as_str()),
                        ("fillcolor", fillcolor.as_str()),
                    ]),
                );
            }
        }

        let position = self.options.node_positions.get(&node.id).copied();
        if let Some(pos) = position {
            attrs.insert("pos".into(), format!("{},{}!", pos.x, pos.y));
        }

        let id = NodeId(self.diagram.nodes.len());
        self.diagram.nodes.push(DiagramNode {
            uuid: node.uuid.clone(),
            dot_id: format!("node_{}", node.uuid),
            kind: node.kind,
            label: label.label,
            image,
            position,
            attributes: attrs,
        });
        id
    }

    fn track_graph_edges(&mut self, store: &Store) {
        for edge in &store.edges {
            if edge.destroyed {
                continue;
            }
            let (kind, role) = match edge.kind {
                EdgeKind::Reference => (LinkKind::Reference, &self.theme.reference_link),
                EdgeKind::Dependency => (LinkKind::Dependency, &self.theme.dependency_link),
                EdgeKind::Other => {
                    trace!(edge = edge.uuid.as_str(); "skipping edge of unsupported kind");
                    continue;
                }
            };

            let (Some(from), Some(to)) = (
                self.diagram.entity(&edge.source),
                self.diagram.entity(&edge.target),
            ) else {
                warn!(
                    edge = edge.uuid.as_str(),
                    source = edge.source.as_str(),
                    target = edge.target.as_str();
                    "unresolved edge source and/or target"
                );
                continue;
            };

            let diagram_edge = DiagramEdge {
                id: edge.uuid.clone(),
                kind,
                from,
                to,
                extraneous: edge.extraneous,
                attributes: role.clone(),
            };
            self.edges.track(&self.diagram, diagram_edge);
        }
    }
}

fn format_inches(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    rounded.to_string()
}

fn pattern(value: &str) -> Result<Regex, DiagramError> {
    Regex::new(value).map_err(|e| DiagramError::Theme(format!("invalid pattern `{value}`: {e}")))
}

fn select_stages<'g>(
    stages: Vec<&'g GraphNode>,
    selection: &StageSelection,
) -> Result<Vec<&'g GraphNode>, DiagramError> {
    let live: Vec<&GraphNode> = stages.into_iter().filter(|s| !s.destroyed).collect();
    Ok(match selection {
        StageSelection::All => live,
        StageSelection::First => live.into_iter().take(1).collect(),
        StageSelection::Last => live.into_iter().last().into_iter().collect(),
        StageSelection::Pattern(p) => {
            let re = pattern(p)?;
            live.into_iter().filter(|s| re.is_match(&s.id)).collect()
        }
    })
}

/// Builds a diagram from an infrastructure graph.
///
/// Roots are the graph's stages, else its root stacks, else the root's
/// children with graph containers flattened.
pub fn build_diagram(
    store: &Store,
    theme: &GraphTheme,
    images: &dyn ImageResolver,
    options: &DiagramOptions,
) -> Result<Diagram, DiagramError> {
    let mut builder = Builder::new(theme, images, options);
    let rendering = &theme.rendering;

    let stages = store.stages();
    let stacks = store.root_stacks();
    if !stages.is_empty() {
        for stage in select_stages(stages, &rendering.stage)? {
            builder.visit_container(stage, ContainerKind::Stage, Parent::Root, 0)?;
        }
    } else if !stacks.is_empty() {
        let filter = rendering.stack.as_deref().map(pattern).transpose()?;
        for stack in stacks {
            if stack.destroyed || filter.as_ref().is_some_and(|re| !re.is_match(&stack.id)) {
                continue;
            }
            builder.visit_container(stack, ContainerKind::Stack, Parent::Root, 0)?;
        }
    } else {
        for child in &store.root.children {
            if child.graph_container && !child.destroyed {
                for grandchild in &child.children {
                    builder.visit(grandchild, Parent::Root, 0)?;
                }
            } else {
                builder.visit(child, Parent::Root, 0)?;
            }
        }
    }

    builder.track_graph_edges(store);

    let Builder {
        mut diagram, edges, ..
    } = builder;
    diagram.edges = edges.resolve(&diagram, options.compact);

    info!(
        title = diagram.title.as_str(),
        nodes = diagram.nodes.len(),
        containers = diagram.containers.len(),
        edges = diagram.edges.len(),
        images = diagram.tracked_images.len();
        "built diagram"
    );
    debug!(tracked = edges.tracked_count(), compact = options.compact; "resolved diagram edges");

    Ok(diagram)
}
