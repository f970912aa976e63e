//! # Scene Evaluation
//!
//! Keeps a document tree in step with a set of paper descriptors and the
//! current navigation path.
//!
//! ## Evaluation
//!
//! For each entity, in the order the store returns them:
//!
//! 1. The descriptor's `match` rule decides visibility for the path.
//! 2. A hidden descriptor has its node detached (not destroyed) and its
//!    children are left alone.
//! 3. A visible descriptor is synchronized to a node (see `sync`), which is
//!    then inserted under its parent if the parent changed since last time.
//! 4. Children are promoted to first-class descriptors, receiving the
//!    identity `<parent uuid>/<1-based index>` when they carry none, and
//!    evaluated recursively against the same path.
//!
//! ## Ordering
//!
//! Insertion scans the parent's current children and places the node before
//! the first sibling whose order is strictly greater, appending otherwise.
//! Equal orders therefore keep arrival order. The scan only runs when the
//! effective parent changes; it is never maintained incrementally.
//!
//! ## Partial failure
//!
//! A descriptor whose parent cannot be resolved is logged and skipped along
//! with its subtree. Siblings and other entities are still evaluated.

use crate::config::{Assembly, SceneConfig};
use crate::descriptor::{Child, Paper, SceneEvent, SceneEventKind};
use crate::document::Document;
use crate::effects::EffectHook;
use crate::error::{PaperError, PaperResult};
use crate::loader::ProbeSet;
use crate::markdown::{CommonMark, MarkdownConverter};
use crate::store::{Entity, EntityRef, Query, System};
use crate::sync::Binding;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of evaluating one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Scene state for one document: render bindings, probe set and path
pub struct Scene<D: Document> {
    pub(crate) document: D,
    pub(crate) bindings: HashMap<String, Binding<D::Node>>,
    pub(crate) probes: ProbeSet,
    pub(crate) current_path: String,
    pub(crate) config: SceneConfig,
    pub(crate) markdown: Box<dyn MarkdownConverter>,
    pub(crate) effect: Option<Box<dyn EffectHook>>,
}

impl<D: Document> Scene<D> {
    pub fn new(document: D, config: SceneConfig) -> Self {
        Self {
            document,
            bindings: HashMap::new(),
            probes: ProbeSet::new(),
            current_path: "/".to_string(),
            config,
            markdown: Box::new(CommonMark),
            effect: None,
        }
    }

    pub fn with_markdown(mut self, converter: impl MarkdownConverter + 'static) -> Self {
        self.markdown = Box::new(converter);
        self
    }

    pub fn with_effect(mut self, effect: impl EffectHook + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn set_current_path(&mut self, path: impl Into<String>) {
        self.current_path = path.into();
    }

    pub fn probes(&self) -> &ProbeSet {
        &self.probes
    }

    /// Node materialized for `uuid`, attached or not
    pub fn node(&self, uuid: &str) -> Option<&D::Node> {
        self.bindings.get(uuid).and_then(|b| b.node.as_ref())
    }

    /// Parent the node for `uuid` is currently inserted under
    pub fn attached_parent(&self, uuid: &str) -> Option<&D::Node> {
        self.bindings.get(uuid).and_then(|b| b.parent.as_ref())
    }

    /// Evaluate one entity and its descendants against `path`
    pub fn evaluate(
        &mut self,
        sys: &System,
        entity: &EntityRef,
        path: &str,
    ) -> PaperResult<Visibility> {
        self.evaluate_entity(sys, entity, path, None, None)
    }

    /// Re-evaluate every entity carrying a descriptor against `path`
    #[instrument(skip(self, sys))]
    pub fn page_change(&mut self, sys: &System, path: &str) -> PaperResult<()> {
        let candidates = sys.query(&Query::Paper);
        info!(candidates = candidates.len(), "Re-evaluating scene");

        match self.config.assembly {
            Assembly::Direct => {
                for entity in &candidates {
                    self.evaluate_logged(sys, entity, path, None);
                }
            }
            Assembly::Fragment => {
                for entity in &candidates {
                    if let Some(uuid) = entity_uuid(entity) {
                        self.detach(&uuid)?;
                    }
                }
                let fragment = self.document.create_fragment()?;
                for entity in &candidates {
                    self.evaluate_logged(sys, entity, path, Some(&fragment));
                }
                let body = self.document.body();
                self.document.append_child(&body, &fragment)?;
            }
        }
        Ok(())
    }

    fn evaluate_logged(
        &mut self,
        sys: &System,
        entity: &EntityRef,
        path: &str,
        target: Option<&D::Node>,
    ) {
        if let Err(err) = self.evaluate_entity(sys, entity, path, target, None) {
            warn!(error = %err, "Entity evaluation failed");
        }
    }

    /// `from` is the uuid of the promoting parent when `entity` is a child
    fn evaluate_entity(
        &mut self,
        sys: &System,
        entity: &EntityRef,
        path: &str,
        target: Option<&D::Node>,
        from: Option<&str>,
    ) -> PaperResult<Visibility> {
        let mut guard = entity.try_borrow_mut().map_err(|_| PaperError::EntityBusy {
            from: from.unwrap_or("<root>").to_string(),
        })?;
        let Entity { uuid, paper } = &mut *guard;
        let Some(paper) = paper.as_mut() else {
            debug!(uuid = %uuid, "Entity has no paper descriptor");
            return Ok(Visibility::Hidden);
        };
        if let Some(parent) = from {
            paper.parent = Some(parent.to_string());
        }
        self.evaluate_paper(sys, uuid, paper, path, target)
    }

    fn evaluate_paper(
        &mut self,
        sys: &System,
        uuid: &str,
        paper: &mut Paper,
        path: &str,
        target: Option<&D::Node>,
    ) -> PaperResult<Visibility> {
        let uuid = paper.uuid.get_or_insert_with(|| uuid.to_string()).clone();

        if !paper.is_visible(path) {
            self.detach(&uuid)?;
            return Ok(Visibility::Hidden);
        }

        let node = self.synchronize(sys, &uuid, paper)?;

        let Some(parent) = self.resolve_parent(paper.parent.as_deref(), target) else {
            error!(uuid = %uuid, parent = ?paper.parent, "Parent node missing, skipping subtree");
            return Err(PaperError::ParentMissing {
                uuid,
                parent: paper.parent.clone(),
            });
        };

        self.attach(&uuid, &node, &parent, paper.order_key())?;

        if let Some(hook) = paper.onevent.clone() {
            hook.call(&SceneEvent {
                event: SceneEventKind::Show,
                paper: &*paper,
                system: sys.as_ref(),
            });
        }

        for (index, child) in paper.children.iter_mut().enumerate() {
            let result = match child {
                Child::Paper(child) => {
                    let child_uuid = child
                        .uuid
                        .clone()
                        .unwrap_or_else(|| format!("{}/{}", uuid, index + 1));
                    child.parent = Some(uuid.clone());
                    self.evaluate_paper(sys, &child_uuid, child, path, target)
                }
                Child::Entity(entity) => {
                    self.evaluate_entity(sys, entity, path, target, Some(&uuid))
                }
            };
            if let Err(err) = result {
                warn!(parent = %uuid, error = %err, "Child evaluation failed");
            }
        }

        Ok(Visibility::Visible)
    }

    /// The parent entity's node when `parent` is set, else the target or body
    fn resolve_parent(&self, parent: Option<&str>, target: Option<&D::Node>) -> Option<D::Node> {
        match parent {
            Some(parent) => self
                .bindings
                .get(parent)
                .and_then(|b| b.node.clone())
                .or_else(|| self.document.get_element_by_id(parent)),
            None => Some(target.cloned().unwrap_or_else(|| self.document.body())),
        }
    }

    fn attach(
        &mut self,
        uuid: &str,
        node: &D::Node,
        parent: &D::Node,
        order: f64,
    ) -> PaperResult<()> {
        if self.attached_parent(uuid) == Some(parent) {
            return Ok(());
        }

        let before = self
            .document
            .children(parent)
            .into_iter()
            .filter(|sibling| sibling != node)
            .find(|sibling| self.sibling_order(sibling) > order);

        match &before {
            Some(reference) => self.document.insert_before(parent, node, reference)?,
            None => self.document.append_child(parent, node)?,
        }

        if let Some(binding) = self.bindings.get_mut(uuid) {
            binding.order = order;
            binding.parent = Some(parent.clone());
        }
        debug!(uuid, order, appended = before.is_none(), "Inserted node");
        Ok(())
    }

    fn sibling_order(&self, sibling: &D::Node) -> f64 {
        self.document
            .id(sibling)
            .and_then(|id| self.bindings.get(&id))
            .map_or(0.0, |b| b.order)
    }

    /// Take a hidden descriptor's node out of the tree
    pub(crate) fn detach(&mut self, uuid: &str) -> PaperResult<()> {
        let Some(binding) = self.bindings.get_mut(uuid) else {
            return Ok(());
        };
        if binding.parent.take().is_some() {
            if let Some(node) = &binding.node {
                self.document.remove(node)?;
                debug!(uuid, "Detached node");
            }
        }
        Ok(())
    }
}

fn entity_uuid(entity: &EntityRef) -> Option<String> {
    let entity = entity.try_borrow().ok()?;
    let paper = entity.paper.as_ref()?;
    Some(paper.uuid.clone().unwrap_or_else(|| entity.uuid.clone()))
}
