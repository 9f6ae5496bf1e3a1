pub mod config;
pub mod diagram;
pub mod error;
pub mod export;
pub mod fonts;
pub mod graph;
pub mod layout_engine;
pub mod plugin;
pub mod svg;
pub mod theme;
pub mod xml;

pub use error::DiagramError;
