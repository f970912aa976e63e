/// Rendering surface abstraction
///
/// The scene never talks to a concrete document. Every node operation it
/// needs goes through [`Document`], which has two implementations: the
/// in-memory [`MemoryDocument`](crate::memory_document::MemoryDocument) used
/// for server-side evaluation and tests, and the browser surface in the
/// `paper-wasm` package.
use crate::error::PaperResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Event categories a descriptor can bind callbacks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Click,
    Change,
    /// Enter/return pressed inside the node
    Return,
}

/// Surface-independent view of a user event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomEvent {
    /// Native event type, e.g. `click` or `keydown`
    pub kind: String,
    /// Current value of the event target, for form controls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Key name for keyboard events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl DomEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Handler bound to a node
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&DomEvent)>);

impl Handler {
    pub fn new(f: impl Fn(&DomEvent) + 'static) -> Self {
        Handler(Rc::new(f))
    }

    pub fn call(&self, event: &DomEvent) {
        (self.0)(event)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// Node-level operations consumed by the synchronizer and the scene
///
/// Reads are infallible. Mutations return `PaperResult` because a real
/// surface may refuse them (invalid tag names, detached targets).
pub trait Document {
    type Node: Clone + PartialEq + fmt::Debug;

    /// Default root container
    fn body(&self) -> Self::Node;

    fn create_element(&mut self, kind: &str) -> PaperResult<Self::Node>;

    /// Detached assembly target whose children move over when appended
    fn create_fragment(&mut self) -> PaperResult<Self::Node>;

    fn get_element_by_id(&self, id: &str) -> Option<Self::Node>;

    /// Lowercase element kind
    fn node_name(&self, node: &Self::Node) -> String;

    fn id(&self, node: &Self::Node) -> Option<String>;

    fn set_id(&mut self, node: &Self::Node, id: &str) -> PaperResult<()>;

    /// Detach the node from its parent. The node stays usable.
    fn remove(&mut self, node: &Self::Node) -> PaperResult<()>;

    fn children(&self, parent: &Self::Node) -> Vec<Self::Node>;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> PaperResult<()>;

    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: &Self::Node,
    ) -> PaperResult<()>;

    fn inner_html(&self, node: &Self::Node) -> String;

    fn set_inner_html(&mut self, node: &Self::Node, html: &str) -> PaperResult<()>;

    /// Replace the whole style declaration
    fn set_css_text(&mut self, node: &Self::Node, css: &str) -> PaperResult<()>;

    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str) -> PaperResult<()>;

    /// Space-delimited class list
    fn class_name(&self, node: &Self::Node) -> String;

    fn contains_class(&self, node: &Self::Node, class: &str) -> bool;

    fn add_class(&mut self, node: &Self::Node, class: &str) -> PaperResult<()>;

    fn remove_class(&mut self, node: &Self::Node, class: &str) -> PaperResult<()>;

    fn property(&self, node: &Self::Node, name: &str) -> Option<Value>;

    fn set_property(&mut self, node: &Self::Node, name: &str, value: &Value) -> PaperResult<()>;

    /// Bind a handler, replacing any previous handler of the same kind
    fn set_handler(
        &mut self,
        node: &Self::Node,
        kind: HandlerKind,
        handler: Handler,
    ) -> PaperResult<()>;
}
