/// In-memory document for server-side evaluation
///
/// Satisfies the same [`Document`] contract as a browser without any real
/// rendering surface, so descriptor trees evaluate identically on a server.
/// Every created node lives in an arena for the lifetime of the document;
/// detaching a node keeps it reachable through `get_element_by_id`, which is
/// what lets a later pass re-bind previously rendered markup.
use crate::document::{Document, DomEvent, Handler, HandlerKind};
use crate::error::{PaperError, PaperResult};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

const FRAGMENT: &str = "#document-fragment";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Arena index of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
struct NodeData {
    name: String,
    id: Option<String>,
    classes: Vec<String>,
    style: IndexMap<String, String>,
    properties: BTreeMap<String, Value>,
    inner_html: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    handlers: HashMap<HandlerKind, Handler>,
}

#[derive(Debug)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    body: NodeId,
    mutations: usize,
}

impl MemoryDocument {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: NodeId(0),
            mutations: 0,
        };
        doc.body = doc.alloc("body");
        doc
    }

    /// Number of surface mutations performed so far
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    pub fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.data(node).parent
    }

    pub fn is_attached(&self, node: &NodeId) -> bool {
        let mut current = *node;
        while let Some(parent) = self.data(&current).parent {
            if parent == self.body {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Ids of the direct children, in order; anonymous children are skipped
    pub fn child_ids(&self, parent: &NodeId) -> Vec<String> {
        self.data(parent)
            .children
            .iter()
            .filter_map(|child| self.data(child).id.clone())
            .collect()
    }

    pub fn css_text(&self, node: &NodeId) -> String {
        self.data(node)
            .style
            .iter()
            .map(|(k, v)| format!("{}: {};", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn style(&self, node: &NodeId, property: &str) -> Option<&str> {
        self.data(node).style.get(property).map(String::as_str)
    }

    pub fn handler(&self, node: &NodeId, kind: HandlerKind) -> Option<Handler> {
        self.data(node).handlers.get(&kind).cloned()
    }

    /// Invoke the handler bound to `node`, returning whether one was bound
    pub fn dispatch(&self, node: &NodeId, kind: HandlerKind, event: &DomEvent) -> bool {
        match self.handler(node, kind) {
            Some(handler) => {
                handler.call(event);
                true
            }
            None => false,
        }
    }

    /// Serialize the body and its subtree to HTML
    pub fn to_html(&self) -> String {
        self.render(&self.body)
    }

    pub fn render(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.render_into(node, &mut out);
        out
    }

    fn render_into(&self, node: &NodeId, out: &mut String) {
        let data = self.data(node);
        if data.name == FRAGMENT {
            for child in &data.children {
                self.render_into(child, out);
            }
            return;
        }

        out.push('<');
        out.push_str(&data.name);
        if let Some(id) = &data.id {
            push_attr(out, "id", id);
        }
        if !data.classes.is_empty() {
            push_attr(out, "class", &data.classes.join(" "));
        }
        if !data.style.is_empty() {
            push_attr(out, "style", &self.css_text(node));
        }
        for (name, value) in &data.properties {
            match value {
                Value::String(s) => push_attr(out, name, s),
                Value::Number(n) => push_attr(out, name, &n.to_string()),
                Value::Bool(true) => {
                    let _ = write!(out, " {}", name);
                }
                _ => {}
            }
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&data.name.as_str()) {
            return;
        }

        out.push_str(&data.inner_html);
        for child in &data.children {
            self.render_into(child, out);
        }
        let _ = write!(out, "</{}>", data.name);
    }

    fn alloc(&mut self, name: &str) -> NodeId {
        self.nodes.push(NodeData {
            name: name.to_lowercase(),
            ..NodeData::default()
        });
        NodeId(self.nodes.len() - 1)
    }

    fn data(&self, node: &NodeId) -> &NodeData {
        &self.nodes[node.0]
    }

    fn data_mut(&mut self, node: &NodeId) -> &mut NodeData {
        self.mutations += 1;
        &mut self.nodes[node.0]
    }

    fn detach(&mut self, node: &NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| c != node);
        }
    }

    /// A parent never holds two children with the same id
    fn holds_id(&self, parent: &NodeId, child: &NodeId) -> bool {
        match &self.data(child).id {
            Some(id) => self
                .data(parent)
                .children
                .iter()
                .any(|c| self.data(c).id.as_ref() == Some(id)),
            None => false,
        }
    }

    /// Whether `node` is `ancestor` itself or lies beneath it
    fn contains(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        let mut current = Some(*node);
        while let Some(id) = current {
            if id == *ancestor {
                return true;
            }
            current = self.data(&id).parent;
        }
        false
    }

    /// Move `child` under `parent`, before `reference` when given
    fn adopt(
        &mut self,
        operation: &'static str,
        parent: &NodeId,
        child: &NodeId,
        reference: Option<&NodeId>,
    ) -> PaperResult<()> {
        if self.contains(child, parent) {
            return Err(PaperError::surface(operation, "node would contain itself"));
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(*parent);
        let index = reference.and_then(|r| self.data(parent).children.iter().position(|c| c == r));
        let children = &mut self.data_mut(parent).children;
        match index {
            Some(index) => children.insert(index, *child),
            None => children.push(*child),
        }
        Ok(())
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryDocument {
    type Node = NodeId;

    fn body(&self) -> NodeId {
        self.body
    }

    fn create_element(&mut self, kind: &str) -> PaperResult<NodeId> {
        self.mutations += 1;
        Ok(self.alloc(kind))
    }

    fn create_fragment(&mut self) -> PaperResult<NodeId> {
        Ok(self.alloc(FRAGMENT))
    }

    fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        // Newest first, so a recreated node shadows the one it replaced
        self.nodes
            .iter()
            .rposition(|data| data.id.as_deref() == Some(id))
            .map(NodeId)
    }

    fn node_name(&self, node: &NodeId) -> String {
        self.data(node).name.clone()
    }

    fn id(&self, node: &NodeId) -> Option<String> {
        self.data(node).id.clone()
    }

    fn set_id(&mut self, node: &NodeId, id: &str) -> PaperResult<()> {
        self.data_mut(node).id = Some(id.to_string());
        Ok(())
    }

    fn remove(&mut self, node: &NodeId) -> PaperResult<()> {
        if self.data(node).parent.is_some() {
            self.mutations += 1;
            self.detach(node);
        }
        Ok(())
    }

    fn children(&self, parent: &NodeId) -> Vec<NodeId> {
        self.data(parent).children.clone()
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> PaperResult<()> {
        if self.data(child).name == FRAGMENT {
            for moved in self.children(child) {
                self.append_child(parent, &moved)?;
            }
            return Ok(());
        }
        if self.holds_id(parent, child) {
            return Ok(());
        }
        self.adopt("append_child", parent, child, None)
    }

    fn insert_before(&mut self, parent: &NodeId, child: &NodeId, reference: &NodeId) -> PaperResult<()> {
        self.adopt("insert_before", parent, child, Some(reference))
    }

    fn inner_html(&self, node: &NodeId) -> String {
        self.data(node).inner_html.clone()
    }

    fn set_inner_html(&mut self, node: &NodeId, html: &str) -> PaperResult<()> {
        self.data_mut(node).inner_html = html.to_string();
        Ok(())
    }

    fn set_css_text(&mut self, node: &NodeId, css: &str) -> PaperResult<()> {
        let style = css
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        self.data_mut(node).style = style;
        Ok(())
    }

    fn set_style(&mut self, node: &NodeId, property: &str, value: &str) -> PaperResult<()> {
        self.data_mut(node)
            .style
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    fn class_name(&self, node: &NodeId) -> String {
        self.data(node).classes.join(" ")
    }

    fn contains_class(&self, node: &NodeId, class: &str) -> bool {
        self.data(node).classes.iter().any(|c| c == class)
    }

    fn add_class(&mut self, node: &NodeId, class: &str) -> PaperResult<()> {
        if !self.contains_class(node, class) {
            self.data_mut(node).classes.push(class.to_string());
        }
        Ok(())
    }

    fn remove_class(&mut self, node: &NodeId, class: &str) -> PaperResult<()> {
        if self.contains_class(node, class) {
            self.data_mut(node).classes.retain(|c| c != class);
        }
        Ok(())
    }

    fn property(&self, node: &NodeId, name: &str) -> Option<Value> {
        self.data(node).properties.get(name).cloned()
    }

    fn set_property(&mut self, node: &NodeId, name: &str, value: &Value) -> PaperResult<()> {
        self.data_mut(node)
            .properties
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    fn set_handler(&mut self, node: &NodeId, kind: HandlerKind, handler: Handler) -> PaperResult<()> {
        self.data_mut(node).handlers.insert(kind, handler);
        Ok(())
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
