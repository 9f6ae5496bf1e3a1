use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind tag of an infrastructure node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Resource,
    CfnResource,
    NestedStack,
    Stack,
    Stage,
    #[default]
    #[serde(other)]
    Default,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Resource => "Resource",
            NodeKind::CfnResource => "CfnResource",
            NodeKind::NestedStack => "NestedStack",
            NodeKind::Stack => "Stack",
            NodeKind::Stage => "Stage",
            NodeKind::Default => "Default",
        }
    }
}

/// Kind tag of an infrastructure edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    Reference,
    Dependency,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub uuid: String,
    /// Construct id, used for labels and position lookups.
    pub id: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub children: Vec<GraphNode>,
    #[serde(default)]
    pub destroyed: bool,
    /// Pure grouping node that is flattened away at the top level.
    #[serde(default)]
    pub graph_container: bool,
    #[serde(default)]
    pub cfn_type: Option<String>,
    #[serde(default)]
    pub cfn_props: Map<String, Value>,
    #[serde(default)]
    pub imported: bool,
    #[serde(default)]
    pub wraps_cfn_resource: bool,
}

impl GraphNode {
    pub fn new(uuid: impl Into<String>, id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            uuid: uuid.into(),
            id: id.into(),
            kind,
            children: Vec::new(),
            destroyed: false,
            graph_container: false,
            cfn_type: None,
            cfn_props: Map::new(),
            imported: false,
            wraps_cfn_resource: false,
        }
    }

    pub fn with_children(mut self, children: Vec<GraphNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_cfn_type(mut self, cfn_type: impl Into<String>) -> Self {
        self.cfn_type = Some(cfn_type.into());
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns a cfn property as a string, if present and textual.
    pub fn cfn_prop(&self, key: &str) -> Option<&str> {
        self.cfn_props.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub uuid: String,
    pub kind: EdgeKind,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub destroyed: bool,
    #[serde(default)]
    pub extraneous: bool,
}

impl GraphEdge {
    pub fn new(
        uuid: impl Into<String>,
        kind: EdgeKind,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            kind,
            source: source.into(),
            target: target.into(),
            destroyed: false,
            extraneous: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub root: GraphNode,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl Store {
    pub fn new(root: GraphNode, edges: Vec<GraphEdge>) -> Self {
        Self { root, edges }
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Stage nodes reachable from the root without descending into a stage.
    pub fn stages(&self) -> Vec<&GraphNode> {
        let mut found = Vec::new();
        collect_outermost(&self.root, NodeKind::Stage, &mut found);
        found
    }

    /// Stack nodes reachable from the root without descending into a stack.
    pub fn root_stacks(&self) -> Vec<&GraphNode> {
        let mut found = Vec::new();
        collect_outermost(&self.root, NodeKind::Stack, &mut found);
        found
    }

    /// Finds a node anywhere in the tree by uuid.
    pub fn find(&self, uuid: &str) -> Option<&GraphNode> {
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.uuid == uuid {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }
}

fn collect_outermost<'a>(node: &'a GraphNode, kind: NodeKind, found: &mut Vec<&'a GraphNode>) {
    for child in &node.children {
        if child.kind == kind {
            found.push(child);
        } else {
            collect_outermost(child, kind, found);
        }
    }
}
