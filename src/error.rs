use std::io;

use thiserror::Error;

pub use crate::svg::SvgError;

#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to decode infrastructure graph: {0}")]
    Graph(#[from] serde_json::Error),

    #[error("Failed to decode configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid diagram config '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },

    #[error("Theme error: {0}")]
    Theme(String),

    #[error("Graph nesting exceeds {limit} levels at node {uuid}")]
    DepthExceeded { uuid: String, limit: usize },

    #[error("Layout engine error: {0}")]
    LayoutEngine(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error(transparent)]
    Svg(#[from] SvgError),
}
