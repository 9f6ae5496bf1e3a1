use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::DiagramError;
use crate::graph::{GraphNode, NodeKind};
use crate::theme::{IconTarget, RenderingOptions};

/// Source of icon paths for a resource at a given specificity level.
pub trait ImageResolver {
    fn icon(&self, node: &GraphNode, target: IconTarget) -> Option<String>;
}

/// Resolver that never finds an icon; every resource renders as a plain box.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImages;

impl ImageResolver for NoImages {
    fn icon(&self, _node: &GraphNode, _target: IconTarget) -> Option<String> {
        None
    }
}

/// Icons registered for one resource type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceIcons {
    /// Cfn property whose normalised value selects a data icon.
    pub data_property: Option<String>,
    /// Normalised property value to icon path.
    pub data: HashMap<String, String>,
    pub resource: Option<String>,
    pub general: Option<String>,
    pub service: Option<String>,
    pub category: Option<String>,
}

/// Icon catalog loaded from a TOML manifest:
///
/// ```toml
/// [resources."AWS::EC2::Instance"]
/// data_property = "InstanceType"
/// service = "compute/ec2.svg"
/// category = "categories/compute.svg"
///
/// [resources."AWS::EC2::Instance".data]
/// t3 = "compute/ec2/t3.svg"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssetCatalog {
    pub resources: HashMap<String, ResourceIcons>,
}

impl AssetCatalog {
    pub fn from_toml(content: &str) -> Result<Self, DiagramError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, DiagramError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

/// Normalises a data property value: `t3.micro` -> `t3`, `postgres-14` -> `postgresql`.
fn data_key(value: &str) -> String {
    let lowered = value.to_ascii_lowercase();
    let head = lowered
        .split(['.', '-'])
        .next()
        .unwrap_or_default()
        .to_string();
    match head.as_str() {
        "postgres" => "postgresql".to_string(),
        _ => head,
    }
}

impl ImageResolver for AssetCatalog {
    fn icon(&self, node: &GraphNode, target: IconTarget) -> Option<String> {
        let icons = self.resources.get(node.cfn_type.as_deref()?)?;
        match target {
            IconTarget::Data => {
                let property = icons.data_property.as_deref()?;
                let value = node.cfn_prop(property)?;
                icons.data.get(&data_key(value)).cloned()
            }
            IconTarget::Resource => icons.resource.clone(),
            IconTarget::General => icons.general.clone(),
            IconTarget::Service => icons.service.clone(),
            IconTarget::Category => icons.category.clone(),
        }
    }
}

/// Finds the most specific icon for a resource-like node within `min..=max`.
pub fn resolve_image(
    resolver: &dyn ImageResolver,
    node: &GraphNode,
    min: IconTarget,
    max: IconTarget,
) -> Option<String> {
    let found = IconTarget::range(min, max).find_map(|target| resolver.icon(node, target));
    if found.is_none() {
        debug!(node = node.uuid.as_str(), cfn_type = node.cfn_type.as_deref().unwrap_or(""); "no icon for resource");
    }
    found
}

/// Icon range configured for a node kind. Resources wrapping a cfn resource
/// start at the service level.
pub fn icon_range(node: &GraphNode, rendering: &RenderingOptions) -> Option<(IconTarget, IconTarget)> {
    match node.kind {
        NodeKind::Resource => {
            let min = if node.wraps_cfn_resource {
                IconTarget::Service.max(rendering.resource_icon_min)
            } else {
                rendering.resource_icon_min
            };
            Some((min, rendering.resource_icon_max))
        }
        NodeKind::CfnResource => Some((
            rendering.cfn_resource_icon_min,
            rendering.cfn_resource_icon_max,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATALOG: &str = r#"
[resources."AWS::EC2::Instance"]
data_property = "InstanceType"
resource = "compute/ec2/instance.svg"
service = "compute/ec2.svg"
category = "categories/compute.svg"

[resources."AWS::EC2::Instance".data]
t3 = "compute/ec2/t3.svg"

[resources."AWS::S3::Bucket"]
category = "categories/storage.svg"
"#;

    fn instance(instance_type: &str) -> GraphNode {
        let mut node = GraphNode::new("i1", "Instance", NodeKind::CfnResource)
            .with_cfn_type("AWS::EC2::Instance");
        node.cfn_props
            .insert("InstanceType".into(), json!(instance_type));
        node
    }

    #[test]
    fn most_specific_icon_wins() {
        let catalog = AssetCatalog::from_toml(CATALOG).unwrap();
        let node = instance("t3.micro");
        assert_eq!(
            resolve_image(&catalog, &node, IconTarget::Data, IconTarget::Category).as_deref(),
            Some("compute/ec2/t3.svg")
        );
        assert_eq!(
            resolve_image(&catalog, &node, IconTarget::Resource, IconTarget::Category).as_deref(),
            Some("compute/ec2/instance.svg")
        );
    }

    #[test]
    fn falls_through_missing_levels() {
        let catalog = AssetCatalog::from_toml(CATALOG).unwrap();
        let node = instance("m5.large");
        assert_eq!(
            resolve_image(&catalog, &node, IconTarget::Data, IconTarget::Resource).as_deref(),
            Some("compute/ec2/instance.svg")
        );

        let bucket = GraphNode::new("b", "Bucket", NodeKind::CfnResource).with_cfn_type("AWS::S3::Bucket");
        assert_eq!(
            resolve_image(&catalog, &bucket, IconTarget::Data, IconTarget::Service),
            None
        );
        assert_eq!(
            resolve_image(&catalog, &bucket, IconTarget::Data, IconTarget::Category).as_deref(),
            Some("categories/storage.svg")
        );
    }

    #[test]
    fn unknown_type_has_no_icon() {
        let catalog = AssetCatalog::from_toml(CATALOG).unwrap();
        let node = GraphNode::new("x", "Topic", NodeKind::CfnResource).with_cfn_type("AWS::SNS::Topic");
        assert_eq!(resolve_image(&catalog, &node, IconTarget::Data, IconTarget::Category), None);
    }

    #[test]
    fn data_keys_are_normalised() {
        assert_eq!(data_key("T3.Micro"), "t3");
        assert_eq!(data_key("postgres-14"), "postgresql");
        assert_eq!(data_key("mysql"), "mysql");
    }

    #[test]
    fn wrapped_resources_start_at_service() {
        let rendering = RenderingOptions::default();
        let mut node = GraphNode::new("r", "Bucket", NodeKind::Resource);
        node.wraps_cfn_resource = true;
        assert_eq!(
            icon_range(&node, &rendering),
            Some((IconTarget::Service, IconTarget::Category))
        );

        let plain = GraphNode::new("d", "Group", NodeKind::Default);
        assert_eq!(icon_range(&plain, &rendering), None);
    }
}
