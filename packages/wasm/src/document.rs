//! Browser rendering surface
//!
//! [`BrowserDocument`] implements [`Document`] over the live DOM. Event
//! handlers are bound through the `on*` properties so rebinding replaces the
//! previous handler, and the JS closures are owned here for as long as the
//! node's uuid is bound.

use paper::{Document, DomEvent, Handler, HandlerKind, PaperError, PaperResult};
use serde_json::{Number, Value};
use std::collections::HashMap;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, HtmlElement, HtmlInputElement, KeyboardEvent, Node};

const ENTER: &str = "Enter";

type EventClosure = Closure<dyn FnMut(Event)>;

pub struct BrowserDocument {
    document: web_sys::Document,
    body: Node,
    listeners: HashMap<(String, HandlerKind), EventClosure>,
}

impl BrowserDocument {
    pub fn new() -> PaperResult<Self> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| PaperError::surface("document", "no global document"))?;
        let body = document
            .body()
            .ok_or_else(|| PaperError::surface("body", "document has no body"))?;
        Ok(Self {
            document,
            body: body.into(),
            listeners: HashMap::new(),
        })
    }
}

fn js_error(operation: &'static str) -> impl Fn(JsValue) -> PaperError {
    move |err| PaperError::surface(operation, format!("{:?}", err))
}

fn as_element<'a>(node: &'a Node, operation: &'static str) -> PaperResult<&'a Element> {
    node.dyn_ref::<Element>()
        .ok_or_else(|| PaperError::surface(operation, "node is not an element"))
}

fn as_html_element<'a>(node: &'a Node, operation: &'static str) -> PaperResult<&'a HtmlElement> {
    node.dyn_ref::<HtmlElement>()
        .ok_or_else(|| PaperError::surface(operation, "node is not an html element"))
}

/// `marginTop` -> `margin-top`; names already in kebab case pass through
fn kebab_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len() + 4);
    for c in property.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn to_js(value: &Value) -> JsValue {
    match value {
        Value::Null => JsValue::NULL,
        Value::Bool(b) => JsValue::from_bool(*b),
        Value::Number(n) => JsValue::from_f64(n.as_f64().unwrap_or_default()),
        Value::String(s) => JsValue::from_str(s),
        other => js_sys::JSON::parse(&other.to_string()).unwrap_or(JsValue::UNDEFINED),
    }
}

fn from_js(value: JsValue) -> Option<Value> {
    if value.is_undefined() || value.is_null() {
        None
    } else if let Some(b) = value.as_bool() {
        Some(Value::Bool(b))
    } else if let Some(n) = value.as_f64() {
        Number::from_f64(n).map(Value::Number)
    } else {
        value.as_string().map(Value::String)
    }
}

fn dom_event(event: &Event) -> DomEvent {
    let mut dom_event = DomEvent::new(event.type_());
    if let Some(input) = event
        .target()
        .and_then(|target| target.dyn_into::<HtmlInputElement>().ok())
    {
        dom_event = dom_event.with_value(input.value());
    }
    if let Some(keyboard) = event.dyn_ref::<KeyboardEvent>() {
        dom_event = dom_event.with_key(keyboard.key());
    }
    dom_event
}

fn handler_property(kind: HandlerKind) -> &'static str {
    match kind {
        HandlerKind::Click => "onclick",
        HandlerKind::Change => "onchange",
        HandlerKind::Return => "onkeydown",
    }
}

impl Document for BrowserDocument {
    type Node = Node;

    fn body(&self) -> Node {
        self.body.clone()
    }

    fn create_element(&mut self, kind: &str) -> PaperResult<Node> {
        self.document
            .create_element(kind)
            .map(Node::from)
            .map_err(js_error("create_element"))
    }

    fn create_fragment(&mut self) -> PaperResult<Node> {
        Ok(self.document.create_document_fragment().into())
    }

    fn get_element_by_id(&self, id: &str) -> Option<Node> {
        self.document.get_element_by_id(id).map(Node::from)
    }

    fn node_name(&self, node: &Node) -> String {
        node.node_name().to_lowercase()
    }

    fn id(&self, node: &Node) -> Option<String> {
        node.dyn_ref::<Element>()
            .map(Element::id)
            .filter(|id| !id.is_empty())
    }

    fn set_id(&mut self, node: &Node, id: &str) -> PaperResult<()> {
        as_element(node, "set_id")?.set_id(id);
        Ok(())
    }

    fn remove(&mut self, node: &Node) -> PaperResult<()> {
        if let Some(parent) = node.parent_node() {
            parent.remove_child(node).map_err(js_error("remove"))?;
        }
        Ok(())
    }

    fn children(&self, parent: &Node) -> Vec<Node> {
        let list = parent.child_nodes();
        (0..list.length())
            .filter_map(|index| list.item(index))
            .filter(|child| child.node_type() == Node::ELEMENT_NODE)
            .collect()
    }

    fn append_child(&mut self, parent: &Node, child: &Node) -> PaperResult<()> {
        parent
            .append_child(child)
            .map(|_| ())
            .map_err(js_error("append_child"))
    }

    fn insert_before(&mut self, parent: &Node, child: &Node, reference: &Node) -> PaperResult<()> {
        parent
            .insert_before(child, Some(reference))
            .map(|_| ())
            .map_err(js_error("insert_before"))
    }

    fn inner_html(&self, node: &Node) -> String {
        node.dyn_ref::<Element>()
            .map(Element::inner_html)
            .unwrap_or_default()
    }

    fn set_inner_html(&mut self, node: &Node, html: &str) -> PaperResult<()> {
        as_element(node, "set_inner_html")?.set_inner_html(html);
        Ok(())
    }

    fn set_css_text(&mut self, node: &Node, css: &str) -> PaperResult<()> {
        as_html_element(node, "set_css_text")?
            .style()
            .set_css_text(css);
        Ok(())
    }

    fn set_style(&mut self, node: &Node, property: &str, value: &str) -> PaperResult<()> {
        as_html_element(node, "set_style")?
            .style()
            .set_property(&kebab_case(property), value)
            .map_err(js_error("set_style"))
    }

    fn class_name(&self, node: &Node) -> String {
        node.dyn_ref::<Element>()
            .map(Element::class_name)
            .unwrap_or_default()
    }

    fn contains_class(&self, node: &Node, class: &str) -> bool {
        node.dyn_ref::<Element>()
            .is_some_and(|element| element.class_list().contains(class))
    }

    fn add_class(&mut self, node: &Node, class: &str) -> PaperResult<()> {
        as_element(node, "add_class")?
            .class_list()
            .add_1(class)
            .map_err(js_error("add_class"))
    }

    fn remove_class(&mut self, node: &Node, class: &str) -> PaperResult<()> {
        as_element(node, "remove_class")?
            .class_list()
            .remove_1(class)
            .map_err(js_error("remove_class"))
    }

    fn property(&self, node: &Node, name: &str) -> Option<Value> {
        js_sys::Reflect::get(node, &JsValue::from_str(name))
            .ok()
            .and_then(from_js)
    }

    fn set_property(&mut self, node: &Node, name: &str, value: &Value) -> PaperResult<()> {
        js_sys::Reflect::set(node, &JsValue::from_str(name), &to_js(value))
            .map(|_| ())
            .map_err(js_error("set_property"))
    }

    fn set_handler(&mut self, node: &Node, kind: HandlerKind, handler: Handler) -> PaperResult<()> {
        let closure = EventClosure::new(move |event: Event| {
            let event = dom_event(&event);
            if kind == HandlerKind::Return && event.key.as_deref() != Some(ENTER) {
                return;
            }
            handler.call(&event);
        });
        js_sys::Reflect::set(
            node,
            &JsValue::from_str(handler_property(kind)),
            closure.as_ref(),
        )
        .map_err(js_error("set_handler"))?;

        // Replacing the entry drops the closure the property no longer points to
        let key = (self.id(node).unwrap_or_default(), kind);
        self.listeners.insert(key, closure);
        Ok(())
    }
}
