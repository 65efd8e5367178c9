//! 工具层：幻灯片工具集合、注册表、演示文稿句柄与执行器

pub mod deck;
pub mod executor;
pub mod library;
pub mod registry;
pub mod schema;
pub mod slides;
pub mod viewer;

pub use deck::{Deck, DeckController, DeckError, OpenedPresentation, PresentationLibrary, SlideView, Viewer};
pub use executor::ToolExecutor;
pub use library::{DeckLoader, DirectoryLibrary, InMemoryLibrary, StaticDeck};
pub use registry::ToolRegistry;
pub use schema::{parameters_schema, ToolSpec};
pub use slides::SlideTool;
pub use viewer::{LoggingViewer, ViewerAction};
