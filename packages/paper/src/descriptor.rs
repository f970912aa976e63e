/// Paper descriptors
///
/// A descriptor is the declarative record for one renderable unit: what kind
/// of node it wants, its content and styling, where it sits among its
/// siblings and for which paths it is visible. Descriptors carry no render
/// state; the scene keeps materialized nodes in its own side table.
use crate::document::DomEvent;
use crate::error::{PaperError, PaperResult};
use crate::matcher::{self, Match};
use crate::store::{Entity, EntityRef, EntityStore};
use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Kind used for anchors created from `link`
pub const ANCHOR_KIND: &str = "a";

/// Style declaration: a raw style string or per-property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Css {
    Text(String),
    Properties(IndexMap<String, String>),
}

/// Desired class set: a space-delimited string or a list of names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Classes {
    Text(String),
    List(Vec<String>),
}

impl Classes {
    /// Class names in declaration order, without empty entries
    pub fn names(&self) -> Vec<&str> {
        match self {
            Classes::Text(text) => text.split_whitespace().collect(),
            Classes::List(list) => list
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }
}

/// Callback bound to a node event, invoked with the event, the descriptor
/// as it was when bound, and the entity store
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&DomEvent, &Paper, &dyn EntityStore)>);

impl Callback {
    pub fn new(f: impl Fn(&DomEvent, &Paper, &dyn EntityStore) + 'static) -> Self {
        Callback(Rc::new(f))
    }

    pub fn call(&self, event: &DomEvent, paper: &Paper, system: &dyn EntityStore) {
        (self.0)(event, paper, system)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneEventKind {
    Show,
}

/// Record passed to `onevent` hooks
pub struct SceneEvent<'a> {
    pub event: SceneEventKind,
    pub paper: &'a Paper,
    pub system: &'a dyn EntityStore,
}

#[derive(Clone)]
pub struct EventHook(Rc<dyn Fn(&SceneEvent<'_>)>);

impl EventHook {
    pub fn new(f: impl Fn(&SceneEvent<'_>) + 'static) -> Self {
        EventHook(Rc::new(f))
    }

    pub fn call(&self, event: &SceneEvent<'_>) {
        (self.0)(event)
    }
}

impl fmt::Debug for EventHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHook")
    }
}

/// Nested child: an inline descriptor or a child entity
#[derive(Debug, Clone)]
pub enum Child {
    Paper(Paper),
    Entity(EntityRef),
}

/// Declarative descriptor for one renderable unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Paper {
    /// Identity; mirrors the owning entity once evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Element kind; a generic container when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Convert `content` from markdown before injecting it
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub markdown: bool,

    /// Navigable target; forces an anchor node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<Css>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<Classes>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub props: IndexMap<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(skip)]
    pub onclick: Option<Callback>,

    #[serde(skip)]
    pub onchange: Option<Callback>,

    #[serde(skip)]
    pub onreturn: Option<Callback>,

    #[serde(skip)]
    pub onevent: Option<EventHook>,

    /// Visibility rule; absent means always visible
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub matcher: Option<Match>,

    /// Sort key among siblings under the same parent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,

    /// Uuid of the parent entity; the root container when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(
        deserialize_with = "deserialize_children",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<Child>,

    /// Opaque flag handed to the effect hook
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<Value>,
}

impl Paper {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> PaperResult<Self> {
        serde_json::from_str(json).map_err(PaperError::Descriptor)
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_markdown(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self.markdown = true;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_css(mut self, css: Css) -> Self {
        self.css = Some(css);
        self
    }

    pub fn with_classes(mut self, classes: impl Into<String>) -> Self {
        self.classes = Some(Classes::Text(classes.into()));
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_match(mut self, rule: Match) -> Self {
        self.matcher = Some(rule);
        self
    }

    pub fn with_order(mut self, order: f64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_child(mut self, child: Paper) -> Self {
        self.children.push(Child::Paper(child));
        self
    }

    pub fn with_child_entity(mut self, entity: EntityRef) -> Self {
        self.children.push(Child::Entity(entity));
        self
    }

    pub fn on_click(mut self, f: impl Fn(&DomEvent, &Paper, &dyn EntityStore) + 'static) -> Self {
        self.onclick = Some(Callback::new(f));
        self
    }

    pub fn on_change(mut self, f: impl Fn(&DomEvent, &Paper, &dyn EntityStore) + 'static) -> Self {
        self.onchange = Some(Callback::new(f));
        self
    }

    pub fn on_return(mut self, f: impl Fn(&DomEvent, &Paper, &dyn EntityStore) + 'static) -> Self {
        self.onreturn = Some(Callback::new(f));
        self
    }

    pub fn on_event(mut self, f: impl Fn(&SceneEvent<'_>) + 'static) -> Self {
        self.onevent = Some(EventHook::new(f));
        self
    }

    pub fn is_visible(&self, path: &str) -> bool {
        matcher::is_visible(self.matcher.as_ref(), path)
    }

    /// Kind of node to materialize: an anchor when linked, otherwise the
    /// declared kind or `default_kind`
    pub fn resolved_kind<'a>(&'a self, default_kind: &'a str) -> &'a str {
        if self.link.is_some() {
            ANCHOR_KIND
        } else {
            self.kind.as_deref().unwrap_or(default_kind)
        }
    }

    /// Content to render; a link with no content shows the link itself
    pub fn resolved_content(&self) -> Option<&str> {
        self.content
            .as_deref()
            .or(self.link.as_deref())
            .map(str::trim)
            .filter(|content| !content.is_empty())
    }

    pub fn order_key(&self) -> f64 {
        self.order.unwrap_or(0.0)
    }
}

/// Children arrive either as a list or as anything else, which means none
fn deserialize_children<'de, D>(deserializer: D) -> Result<Vec<Child>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    items
        .into_iter()
        .map(|item| {
            let is_entity = item.get("paper").is_some_and(Value::is_object);
            if is_entity {
                serde_json::from_value::<Entity>(item)
                    .map(|entity| Child::Entity(Rc::new(RefCell::new(entity))))
            } else {
                serde_json::from_value::<Paper>(item).map(Child::Paper)
            }
        })
        .collect::<Result<_, _>>()
        .map_err(serde::de::Error::custom)
}

impl Serialize for Child {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Child::Paper(paper) => paper.serialize(serializer),
            Child::Entity(entity) => {
                let entity = entity
                    .try_borrow()
                    .map_err(|_| serde::ser::Error::custom("child entity is borrowed"))?;
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("uuid", &entity.uuid)?;
                map.serialize_entry("paper", &entity.paper)?;
                map.end()
            }
        }
    }
}
