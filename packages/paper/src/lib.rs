pub mod config;
pub mod descriptor;
pub mod document;
pub mod effects;
pub mod error;
pub mod loader;
pub mod markdown;
pub mod matcher;
pub mod memory_document;
pub mod navigation;
pub mod scene;
pub mod store;
mod sync;

#[cfg(test)]
mod tests_scene;

#[cfg(test)]
mod tests_sync;


pub use config::{Assembly, RenderMode, SceneConfig};
pub use descriptor::{Callback, Child, Classes, Css, EventHook, Paper, SceneEvent, SceneEventKind};
pub use document::{Document, DomEvent, Handler, HandlerKind};
pub use effects::EffectHook;
pub use error::{PaperError, PaperResult};
pub use loader::{path_prefixes, ProbeSet};
pub use markdown::{CommonMark, MarkdownConverter};
pub use matcher::{is_visible, Match};
pub use memory_document::{MemoryDocument, NodeId};
pub use navigation::{extract_path, Listener, MemoryRouter, Notice, PaperObserver, Router, SharedScene};
pub use scene::{Scene, Visibility};
pub use store::{Entity, EntityRef, EntityStore, MemoryStore, Query, Request, System};
