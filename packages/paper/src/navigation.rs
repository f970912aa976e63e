/// Navigation integration
///
/// Turns navigation notifications into whole-scene evaluations. In browser
/// mode a [`Router`] is installed once, on the first descriptor change, and
/// immediately broadcasts the current url so the initial scene renders. In
/// server mode no router exists and callers evaluate entities against
/// explicit paths.
///
/// Evaluations never overlap: [`SharedScene`] queues a navigation that
/// arrives while another is in flight and drains it afterwards.
use crate::config::RenderMode;
use crate::document::Document;
use crate::error::{PaperError, PaperResult};
use crate::scene::{Scene, Visibility};
use crate::store::{EntityRef, System};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Base used to resolve bare paths such as `/docs/intro`
const LOCAL_BASE: &str = "http://localhost/";

/// Extract the navigation path from a url
///
/// Percent-escapes are decoded, `anchor` is stripped when the path starts
/// with it, and an empty result becomes `/`.
pub fn extract_path(url: &str, anchor: Option<&str>) -> PaperResult<String> {
    let invalid = |reason: String| PaperError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(LOCAL_BASE).and_then(|base| base.join(url)))
        .map_err(|e| invalid(e.to_string()))?;
    let path = urlencoding::decode(parsed.path())
        .map_err(|e| invalid(e.to_string()))?
        .into_owned();

    let path = match anchor.filter(|anchor| !anchor.is_empty()) {
        Some(anchor) => path
            .strip_prefix(anchor)
            .map(str::to_string)
            .unwrap_or(path),
        None => path,
    };

    Ok(if path.is_empty() { "/".to_string() } else { path })
}

pub type Listener = Rc<dyn Fn(&str)>;

/// Navigation notifier
pub trait Router {
    /// Register the single listener invoked with the new url on every change
    fn listen(&self, listener: Listener);

    /// Notify the listener of the current url without a real navigation
    fn broadcast_change(&self);
}

/// Router driven by explicit `navigate` calls
#[derive(Default)]
pub struct MemoryRouter {
    url: RefCell<String>,
    listener: RefCell<Option<Listener>>,
}

impl MemoryRouter {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: RefCell::new(url.into()),
            listener: RefCell::new(None),
        }
    }

    pub fn current_url(&self) -> String {
        self.url.borrow().clone()
    }

    pub fn navigate(&self, url: impl Into<String>) {
        *self.url.borrow_mut() = url.into();
        self.broadcast_change();
    }
}

impl Router for MemoryRouter {
    fn listen(&self, listener: Listener) {
        *self.listener.borrow_mut() = Some(listener);
    }

    fn broadcast_change(&self) {
        let listener = self.listener.borrow().clone();
        let url = self.current_url();
        if let Some(listener) = listener {
            listener(&url);
        }
    }
}

impl<D: Document> Scene<D> {
    /// Handle one navigation: extract the path, re-evaluate the scene, then
    /// probe for lazily loaded content
    #[instrument(skip(self, sys))]
    pub fn navigate(&mut self, sys: &System, url: &str) -> PaperResult<()> {
        let path = extract_path(url, self.config.anchor.as_deref())?;
        info!(path = %path, "Navigated");
        self.current_path = path.clone();
        self.page_change(sys, &path)?;
        self.dynamic_load(sys, &path);
        Ok(())
    }
}

/// Scene behind a single-evaluation guard
pub struct SharedScene<D: Document> {
    scene: RefCell<Scene<D>>,
    pending: RefCell<VecDeque<String>>,
}

impl<D: Document> SharedScene<D> {
    pub fn new(scene: Scene<D>) -> Rc<Self> {
        Rc::new(Self {
            scene: RefCell::new(scene),
            pending: RefCell::new(VecDeque::new()),
        })
    }

    /// Borrow the scene; panics if called from inside an evaluation
    pub fn scene(&self) -> Ref<'_, Scene<D>> {
        self.scene.borrow()
    }

    pub fn try_scene(&self) -> PaperResult<Ref<'_, Scene<D>>> {
        self.scene.try_borrow().map_err(|_| PaperError::SceneBusy)
    }

    pub fn try_scene_mut(&self) -> PaperResult<RefMut<'_, Scene<D>>> {
        self.scene.try_borrow_mut().map_err(|_| PaperError::SceneBusy)
    }

    /// Run `f` on the scene, then any navigation queued while it ran
    pub fn with_scene<T>(
        &self,
        sys: &System,
        f: impl FnOnce(&mut Scene<D>) -> PaperResult<T>,
    ) -> PaperResult<T> {
        let result = {
            let mut scene = self.try_scene_mut()?;
            f(&mut *scene)
        };
        self.drain(sys);
        result
    }

    /// Navigate now, or queue behind the evaluation in flight
    pub fn navigate(&self, sys: &System, url: &str) {
        self.pending.borrow_mut().push_back(url.to_string());
        self.drain(sys);
    }

    fn drain(&self, sys: &System) {
        let Ok(mut scene) = self.scene.try_borrow_mut() else {
            debug!(queued = self.pending.borrow().len(), "Evaluation in flight, navigation queued");
            return;
        };

        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(url) = next else {
                break;
            };
            if let Err(err) = scene.navigate(sys, &url) {
                error!(url = %url, error = %err, "Navigation failed");
            }
        }
    }
}

/// What the store reports to the observer
#[derive(Debug, Clone)]
pub enum Notice {
    /// Periodic heartbeat; ignored
    Tick,
    /// A paper-carrying entity was created or changed
    Changed(EntityRef),
}

/// Entry point reacting to descriptor changes
pub struct PaperObserver<D: Document + 'static> {
    shared: Rc<SharedScene<D>>,
    router: Option<Rc<dyn Router>>,
    listening: bool,
}

impl<D: Document + 'static> PaperObserver<D> {
    pub fn new(scene: Scene<D>, router: Option<Rc<dyn Router>>) -> Self {
        Self {
            shared: SharedScene::new(scene),
            router,
            listening: false,
        }
    }

    pub fn shared(&self) -> &Rc<SharedScene<D>> {
        &self.shared
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn resolve(&mut self, sys: &System, notice: &Notice) -> PaperResult<()> {
        let Notice::Changed(entity) = notice else {
            return Ok(());
        };
        if entity.try_borrow().map_or(true, |e| e.paper.is_none()) {
            return Ok(());
        }

        let mode = self.shared.try_scene()?.config().mode;
        let router = match (mode, &self.router) {
            (RenderMode::Browser, Some(router)) if !self.listening => Rc::clone(router),
            (RenderMode::Browser, None) => {
                warn!("Browser mode without a router, evaluating directly");
                return self.evaluate_current(sys, entity);
            }
            _ => return self.evaluate_current(sys, entity),
        };

        let shared = Rc::clone(&self.shared);
        let system = Rc::clone(sys);
        router.listen(Rc::new(move |url: &str| shared.navigate(&system, url)));
        self.listening = true;
        info!("Router installed");

        // Renders the initial scene, including this entity
        router.broadcast_change();
        Ok(())
    }

    /// Evaluate a single entity against an explicit path
    pub fn evaluate_at(
        &self,
        sys: &System,
        entity: &EntityRef,
        path: &str,
    ) -> PaperResult<Visibility> {
        self.shared.with_scene(sys, |scene| {
            scene.set_current_path(path);
            scene.evaluate(sys, entity, path)
        })
    }

    fn evaluate_current(&self, sys: &System, entity: &EntityRef) -> PaperResult<()> {
        self.shared.with_scene(sys, |scene| {
            let path = scene.current_path().to_string();
            scene.evaluate(sys, entity, &path).map(|_| ())
        })
    }
}
