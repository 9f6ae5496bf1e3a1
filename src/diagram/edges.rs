use indexmap::IndexMap;
use log::trace;

use super::types::{Diagram, DiagramEdge, ResolvedEdge};

/// Collects diagram edges grouped by unordered endpoint pair and collapses
/// parallel edges on demand.
#[derive(Debug, Default)]
pub struct EdgeResolver {
    groups: IndexMap<String, Vec<DiagramEdge>>,
}

fn group_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}:{b}")
    } else {
        format!("{b}:{a}")
    }
}

impl EdgeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an edge to the group of its endpoint pair.
    pub fn track(&mut self, diagram: &Diagram, edge: DiagramEdge) {
        let key = group_key(diagram.uuid_of(edge.from), diagram.uuid_of(edge.to));
        self.groups.entry(key).or_default().push(edge);
    }

    pub fn tracked_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Resolves tracked edges against the finished diagram.
    ///
    /// Compact mode drops verbose edges and keeps one edge per group, the one
    /// with the lowest rank. Otherwise every rank survives once and parallel
    /// edges share their head and tail ports.
    pub fn resolve(&self, diagram: &Diagram, compact: bool) -> Vec<ResolvedEdge> {
        let mut resolved = Vec::new();

        for (key, edges) in &self.groups {
            let mut candidates: Vec<ResolvedEdge> = edges
                .iter()
                .map(|edge| resolve_endpoints(diagram, edge))
                .filter(|(edge, extraneous)| !(compact && (*extraneous || is_closed_loop(edge))))
                .map(|(edge, _)| edge)
                .collect();

            if candidates.is_empty() {
                trace!(group = key.as_str(); "edge group filtered out");
                continue;
            }

            candidates.sort_by_key(|edge| edge.kind.rank());
            candidates.dedup_by_key(|edge| edge.kind.rank());

            if compact {
                candidates.truncate(1);
                resolved.extend(candidates);
                continue;
            }

            let ids: Vec<String> = candidates.iter().map(|edge| edge.id.clone()).collect();
            for i in 0..candidates.len() {
                for j in (i + 1)..candidates.len() {
                    candidates[i].same_head.push(ids[j].clone());
                    candidates[i].same_tail.push(ids[j].clone());
                    candidates[j].same_head.push(ids[i].clone());
                    candidates[j].same_tail.push(ids[i].clone());
                }
            }
            resolved.extend(candidates);
        }

        resolved
    }
}

/// Returns the resolved edge and whether it is extraneous.
fn resolve_endpoints(diagram: &Diagram, edge: &DiagramEdge) -> (ResolvedEdge, bool) {
    let from = diagram.endpoint(edge.from);
    let to = diagram.endpoint(edge.to);
    let extraneous = edge.extraneous || from.synthetic.is_some() || to.synthetic.is_some();

    let mut attributes = edge.attributes.clone();
    attributes.insert("id".into(), edge.id.clone());
    if let Some(ltail) = &from.boundary {
        attributes.insert("ltail".into(), ltail.clone());
    }
    if let Some(lhead) = &to.boundary {
        attributes.insert("lhead".into(), lhead.clone());
    }

    let resolved = ResolvedEdge {
        id: edge.id.clone(),
        kind: edge.kind,
        from,
        to,
        attributes,
        same_head: Vec::new(),
        same_tail: Vec::new(),
    };
    (resolved, extraneous)
}

/// An edge whose ends collapse onto the same entity once compound endpoints
/// are applied.
fn is_closed_loop(edge: &ResolvedEdge) -> bool {
    edge.from.uuid == edge.to.uuid
        || edge.from.node == edge.to.node
        || edge.to.boundary.as_deref() == Some(edge.from.node.as_str())
        || edge.from.boundary.as_deref() == Some(edge.to.node.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::types::{
        Container, ContainerId, ContainerKind, DiagramNode, EntityRef, LinkKind, NodeId,
    };
    use crate::graph::NodeKind;
    use crate::theme::Attributes;
    use proptest::prelude::*;

    fn node(uuid: &str) -> DiagramNode {
        DiagramNode {
            uuid: uuid.into(),
            dot_id: format!("node_{uuid}"),
            kind: NodeKind::Default,
            label: uuid.into(),
            image: None,
            position: None,
            attributes: Attributes::new(),
        }
    }

    fn container(uuid: &str, nodes: Vec<NodeId>) -> Container {
        Container {
            uuid: uuid.into(),
            dot_id: format!("cluster_{uuid}"),
            kind: ContainerKind::Cluster,
            label: uuid.into(),
            attributes: Attributes::new(),
            nodes,
            containers: Vec::new(),
        }
    }

    /// Nodes `a`, `b`, `c`; container `full` holding `c`; empty containers `e1`, `e2`.
    fn diagram() -> Diagram {
        let mut diagram = Diagram::default();
        for uuid in ["a", "b", "c"] {
            diagram.nodes.push(node(uuid));
        }
        diagram.containers.push(container("full", vec![NodeId(2)]));
        diagram.containers.push(container("e1", Vec::new()));
        diagram.containers.push(container("e2", Vec::new()));
        diagram
    }

    const A: EntityRef = EntityRef::Node(NodeId(0));
    const B: EntityRef = EntityRef::Node(NodeId(1));
    const C: EntityRef = EntityRef::Node(NodeId(2));
    const FULL: EntityRef = EntityRef::Container(ContainerId(0));
    const E1: EntityRef = EntityRef::Container(ContainerId(1));
    const E2: EntityRef = EntityRef::Container(ContainerId(2));

    fn edge(id: &str, kind: LinkKind, from: EntityRef, to: EntityRef) -> DiagramEdge {
        DiagramEdge {
            id: id.into(),
            kind,
            from,
            to,
            extraneous: false,
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn reversed_pairs_share_a_group() {
        let diagram = diagram();
        let mut resolver = EdgeResolver::new();
        resolver.track(&diagram, edge("e1", LinkKind::Dependency, A, B));
        resolver.track(&diagram, edge("e2", LinkKind::Reference, B, A));

        let compact = resolver.resolve(&diagram, true);
        assert_eq!(compact.len(), 1);
        assert_eq!(compact[0].id, "e2");
    }

    #[test]
    fn same_rank_duplicates_collapse() {
        let diagram = diagram();
        let mut resolver = EdgeResolver::new();
        resolver.track(&diagram, edge("d1", LinkKind::Dependency, A, B));
        resolver.track(&diagram, edge("d2", LinkKind::Dependency, A, B));
        resolver.track(&diagram, edge("r1", LinkKind::Reference, A, B));

        let verbose = resolver.resolve(&diagram, false);
        let ids: Vec<&str> = verbose.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "d1"]);
        assert_eq!(verbose[0].same_head, vec!["d1"]);
        assert_eq!(verbose[0].same_tail, vec!["d1"]);
        assert_eq!(verbose[1].same_head, vec!["r1"]);
    }

    #[test]
    fn verbose_cross_links_every_pair_once() {
        let diagram = diagram();
        let mut resolver = EdgeResolver::new();
        resolver.track(&diagram, edge("child", LinkKind::Child, A, B));
        resolver.track(&diagram, edge("ref", LinkKind::Reference, A, B));
        resolver.track(&diagram, edge("dep", LinkKind::Dependency, B, A));

        let verbose = resolver.resolve(&diagram, false);
        assert_eq!(verbose.len(), 3);
        assert_eq!(verbose[0].same_head, vec!["ref", "dep"]);
        assert_eq!(verbose[1].same_head, vec!["child", "dep"]);
        assert_eq!(verbose[2].same_tail, vec!["child", "ref"]);
    }

    #[test]
    fn compact_drops_extraneous_and_closed_loops() {
        let diagram = diagram();
        let mut resolver = EdgeResolver::new();
        let mut noisy = edge("noisy", LinkKind::Reference, A, B);
        noisy.extraneous = true;
        resolver.track(&diagram, noisy);
        // `full` resolves to its only node `c`
        resolver.track(&diagram, edge("loop", LinkKind::Reference, FULL, C));
        resolver.track(&diagram, edge("self", LinkKind::Dependency, A, A));

        assert!(resolver.resolve(&diagram, true).is_empty());
        assert_eq!(resolver.resolve(&diagram, false).len(), 3);
    }

    #[test]
    fn compound_edges_carry_boundaries() {
        let diagram = diagram();
        let mut resolver = EdgeResolver::new();
        resolver.track(&diagram, edge("x", LinkKind::Reference, A, FULL));

        let resolved = resolver.resolve(&diagram, true);
        assert_eq!(resolved.len(), 1);
        let edge = &resolved[0];
        assert_eq!(edge.to.node, "node_c");
        assert_eq!(edge.attributes.get("lhead").map(String::as_str), Some("cluster_full"));
        assert_eq!(edge.attributes.get("ltail"), None);
        assert_eq!(edge.attributes.get("id").map(String::as_str), Some("x"));
    }

    #[test]
    fn empty_containers_get_distinct_synthetic_targets() {
        let diagram = diagram();
        let mut resolver = EdgeResolver::new();
        resolver.track(&diagram, edge("x", LinkKind::Reference, A, E1));
        resolver.track(&diagram, edge("y", LinkKind::Reference, E1, E2));

        // synthetic endpoints are extraneous
        assert!(resolver.resolve(&diagram, true).is_empty());

        let verbose = resolver.resolve(&diagram, false);
        assert_eq!(verbose.len(), 2);
        assert_eq!(verbose[0].to.node, "synthetic_cluster_e1");
        assert_eq!(verbose[1].from.node, "synthetic_cluster_e1");
        assert_eq!(verbose[1].to.node, "synthetic_cluster_e2");
        assert_eq!(verbose[1].from.synthetic.as_ref().map(|s| s.container), Some(ContainerId(1)));
        assert_eq!(verbose[1].to.synthetic.as_ref().map(|s| s.container), Some(ContainerId(2)));
    }

    #[test]
    fn resolving_twice_is_stable() {
        let diagram = diagram();
        let mut resolver = EdgeResolver::new();
        resolver.track(&diagram, edge("r", LinkKind::Reference, A, B));
        resolver.track(&diagram, edge("d", LinkKind::Dependency, B, A));
        resolver.track(&diagram, edge("c", LinkKind::Child, A, C));

        for compact in [true, false] {
            let first = resolver.resolve(&diagram, compact);
            let second = resolver.resolve(&diagram, compact);
            let summary = |edges: &[ResolvedEdge]| {
                edges
                    .iter()
                    .map(|e| (e.id.clone(), e.same_head.clone(), e.same_tail.clone()))
                    .collect::<Vec<_>>()
            };
            assert_eq!(summary(&first), summary(&second));
        }
    }

    fn kind_strategy() -> impl Strategy<Value = LinkKind> {
        prop_oneof![
            Just(LinkKind::Child),
            Just(LinkKind::Reference),
            Just(LinkKind::Dependency),
        ]
    }

    proptest! {
        #[test]
        fn compact_keeps_lowest_rank(kinds in prop::collection::vec((kind_strategy(), any::<bool>()), 1..12)) {
            let diagram = diagram();
            let mut resolver = EdgeResolver::new();
            for (i, (kind, reversed)) in kinds.iter().enumerate() {
                let (from, to) = if *reversed { (B, A) } else { (A, B) };
                resolver.track(&diagram, edge(&format!("e{i}"), *kind, from, to));
            }

            let resolved = resolver.resolve(&diagram, true);
            prop_assert_eq!(resolved.len(), 1);
            let best = kinds.iter().map(|(k, _)| k.rank()).min().unwrap();
            prop_assert_eq!(resolved[0].kind.rank(), best);
        }
    }
}
