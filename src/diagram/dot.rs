use indexmap::{IndexMap, IndexSet};

use super::types::{ContainerId, Diagram, NodeId, ResolvedEdge};
use crate::theme::Attributes;
use crate::xml::sanitize_xml_text;

/// Quotes a DOT identifier or attribute value.
///
/// Characters that cannot appear in the rendered SVG are dropped.
pub fn quote(value: &str) -> String {
    let clean = sanitize_xml_text(value);
    let mut out = String::with_capacity(clean.len() + 2);
    out.push('"');
    for c in clean.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn attribute_list(attrs: &Attributes) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!("{}={}", k, quote(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

struct DotWriter<'a> {
    diagram: &'a Diagram,
    synthetic: IndexMap<ContainerId, IndexSet<String>>,
    out: String,
    depth: usize,
}

impl<'a> DotWriter<'a> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn statement(&mut self, keyword: &str, attrs: &Attributes) {
        if attrs.is_empty() {
            return;
        }
        let line = format!("{} [{}];", keyword, attribute_list(attrs));
        self.line(&line);
    }

    fn node(&mut self, id: NodeId) {
        let node = self.diagram.node(id);
        let line = if node.attributes.is_empty() {
            format!("{};", quote(&node.dot_id))
        } else {
            format!("{} [{}];", quote(&node.dot_id), attribute_list(&node.attributes))
        };
        self.line(&line);
    }

    fn container(&mut self, id: ContainerId) {
        let diagram = self.diagram;
        let container = diagram.container(id);

        let open = format!("subgraph {} {{", quote(&container.dot_id));
        self.line(&open);
        self.depth += 1;

        for (k, v) in &container.attributes {
            let line = format!("{} = {};", k, quote(v));
            self.line(&line);
        }
        for node in &container.nodes {
            self.node(*node);
        }
        if let Some(synthetic) = self.synthetic.get(&id).cloned() {
            for dot_id in synthetic {
                let line = format!(
                    "{} [style=\"none\", shape=\"none\", label=\"\", width=\"0\", height=\"0\"];",
                    quote(&dot_id)
                );
                self.line(&line);
            }
        }
        for child in &container.containers {
            self.container(*child);
        }

        self.depth -= 1;
        self.line("}");
    }

    fn edge(&mut self, edge: &ResolvedEdge) {
        let mut attrs = edge.attributes.clone();
        if !edge.same_head.is_empty() {
            attrs.insert("samehead".into(), edge.same_head.join(","));
        }
        if !edge.same_tail.is_empty() {
            attrs.insert("sametail".into(), edge.same_tail.join(","));
        }
        let line = format!(
            "{} -> {} [{}];",
            quote(&edge.from.node),
            quote(&edge.to.node),
            attribute_list(&attrs)
        );
        self.line(&line);
    }
}

/// Serialises a diagram into the DOT language.
pub fn to_dot(diagram: &Diagram) -> String {
    let mut synthetic: IndexMap<ContainerId, IndexSet<String>> = IndexMap::new();
    for edge in &diagram.edges {
        for end in [&edge.from, &edge.to] {
            if let Some(target) = &end.synthetic {
                synthetic
                    .entry(target.container)
                    .or_default()
                    .insert(target.dot_id.clone());
            }
        }
    }

    let mut writer = DotWriter {
        diagram,
        synthetic,
        out: String::new(),
        depth: 0,
    };

    writer.line("digraph \"ROOT\" {");
    writer.depth += 1;
    writer.statement("graph", &diagram.attributes);
    writer.statement("node", &diagram.node_defaults);
    writer.statement("edge", &diagram.edge_defaults);

    for node in &diagram.root_nodes {
        writer.node(*node);
    }
    for container in &diagram.root_containers {
        writer.container(*container);
    }
    for edge in &diagram.edges {
        writer.edge(edge);
    }

    writer.depth -= 1;
    writer.line("}");
    writer.out
}
