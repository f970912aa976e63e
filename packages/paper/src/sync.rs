/// Node synchronization
///
/// Maps a descriptor onto a concrete node with as little churn as possible.
/// A node keeps its identity for as long as its kind is unchanged. Apart from
/// `disabled`, attributes are only (re)applied on the pass that established
/// the node's identity: creation, recreation after a kind change, or
/// recovery of pre-existing markup by uuid.
use crate::descriptor::{Callback, Css, Paper};
use crate::document::{Document, Handler, HandlerKind};
use crate::error::PaperResult;
use crate::scene::Scene;
use crate::store::System;
use serde_json::Value;
use std::rc::Rc;
use tracing::debug;

/// Render state the scene keeps per descriptor uuid
#[derive(Debug, Clone)]
pub(crate) struct Binding<N> {
    /// Materialized node
    pub node: Option<N>,
    /// Kind the node was created with
    pub kind: Option<String>,
    /// Parent the node was last inserted under
    pub parent: Option<N>,
    /// Order value the node was last inserted with
    pub order: f64,
}

impl<N> Default for Binding<N> {
    fn default() -> Self {
        Self {
            node: None,
            kind: None,
            parent: None,
            order: 0.0,
        }
    }
}

impl<D: Document> Scene<D> {
    /// Obtain or update the node for `paper`, returning it
    pub(crate) fn synchronize(
        &mut self,
        sys: &System,
        uuid: &str,
        paper: &mut Paper,
    ) -> PaperResult<D::Node> {
        let mut changed = false;
        let binding = self.bindings.entry(uuid.to_string()).or_default();

        // Re-bind markup that already exists, e.g. server-rendered output
        if binding.node.is_none() {
            if let Some(node) = self.document.get_element_by_id(uuid) {
                debug!(uuid, "Recovered existing node");
                binding.kind = Some(self.document.node_name(&node));
                binding.node = Some(node);
                changed = true;
            }
        }

        let kind = paper.resolved_kind(&self.config.default_kind).to_string();
        let reusable = binding
            .node
            .clone()
            .filter(|_| binding.kind.as_deref() == Some(kind.as_str()));
        let node = match reusable {
            Some(node) => node,
            None => {
                if let Some(stale) = binding.node.take() {
                    debug!(uuid, from = ?binding.kind, to = %kind, "Kind changed, recreating node");
                    self.document.remove(&stale)?;
                }
                let node = self.document.create_element(&kind)?;
                if let Some(link) = &paper.link {
                    self.document
                        .set_property(&node, "href", &Value::String(link.clone()))?;
                }
                self.document.set_id(&node, uuid)?;
                binding.node = Some(node.clone());
                binding.kind = Some(kind);
                // A fresh node is not in the tree yet
                binding.parent = None;
                changed = true;
                node
            }
        };

        if let Some(disabled) = paper.disabled {
            let value = Value::Bool(disabled);
            if self.document.property(&node, "disabled").as_ref() != Some(&value) {
                self.document.set_property(&node, "disabled", &value)?;
            }
        }

        if !changed {
            return Ok(node);
        }

        if paper.logo.is_some() {
            if let Some(effect) = &self.effect {
                effect.apply(paper);
            }
        }

        self.apply_content(&node, paper)?;
        self.apply_css(&node, paper)?;
        self.apply_classes(&node, paper)?;
        self.apply_props(&node, paper)?;
        self.bind_callbacks(sys, &node, paper)?;

        if let Some(placeholder) = &paper.placeholder {
            self.document
                .set_property(&node, "placeholder", &Value::String(placeholder.clone()))?;
        }

        debug!(uuid, "Node synchronized");
        Ok(node)
    }

    fn apply_content(&mut self, node: &D::Node, paper: &Paper) -> PaperResult<()> {
        let Some(content) = paper.resolved_content() else {
            return Ok(());
        };
        let content = if paper.markdown {
            self.markdown.parse(content)
        } else {
            content.to_string()
        };
        if content != self.document.inner_html(node) {
            self.document.set_inner_html(node, &content)?;
        }
        Ok(())
    }

    fn apply_css(&mut self, node: &D::Node, paper: &Paper) -> PaperResult<()> {
        match &paper.css {
            Some(Css::Text(text)) => self.document.set_css_text(node, text),
            Some(Css::Properties(properties)) => {
                for (property, value) in properties {
                    self.document.set_style(node, property, value)?;
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Add missing classes, then drop present ones that are not wanted
    fn apply_classes(&mut self, node: &D::Node, paper: &Paper) -> PaperResult<()> {
        let Some(classes) = &paper.classes else {
            return Ok(());
        };
        let wanted = classes.names();

        for class in &wanted {
            if !self.document.contains_class(node, class) {
                self.document.add_class(node, class)?;
            }
        }

        let present = self.document.class_name(node);
        for class in present.split_whitespace() {
            if !wanted.contains(&class) {
                self.document.remove_class(node, class)?;
            }
        }
        Ok(())
    }

    fn apply_props(&mut self, node: &D::Node, paper: &Paper) -> PaperResult<()> {
        for (name, value) in &paper.props {
            if self.document.property(node, name).as_ref() != Some(value) {
                self.document.set_property(node, name, value)?;
            }
        }
        Ok(())
    }

    fn bind_callbacks(&mut self, sys: &System, node: &D::Node, paper: &Paper) -> PaperResult<()> {
        let callbacks: Vec<(HandlerKind, Callback)> = [
            (HandlerKind::Click, &paper.onclick),
            (HandlerKind::Change, &paper.onchange),
            (HandlerKind::Return, &paper.onreturn),
        ]
        .into_iter()
        .filter_map(|(kind, callback)| callback.clone().map(|callback| (kind, callback)))
        .collect();

        if callbacks.is_empty() {
            return Ok(());
        }

        let snapshot = Rc::new(paper.clone());
        for (kind, callback) in callbacks {
            let paper = Rc::clone(&snapshot);
            let system = Rc::clone(sys);
            let handler = Handler::new(move |event| callback.call(event, &paper, system.as_ref()));
            self.document.set_handler(node, kind, handler)?;
        }
        Ok(())
    }
}
