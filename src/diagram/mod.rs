mod builder;
mod dot;
mod edges;
mod images;
mod label;
mod types;

pub use builder::{DEFAULT_TITLE, DiagramOptions, MAX_DEPTH, build_diagram};
pub use dot::{quote, to_dot};
pub use edges::EdgeResolver;
pub use images::{AssetCatalog, ImageResolver, NoImages, ResourceIcons, icon_range, resolve_image};
pub use label::{MarshalledLabel, marshall_label};
pub use types::{
    Container, ContainerId, ContainerKind, Diagram, DiagramEdge, DiagramNode, Endpoint, EntityRef,
    LinkKind, NodeId, NodePosition, ResolvedEdge, SyntheticTarget,
};
