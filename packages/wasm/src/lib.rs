use paper::{
    Entity, MemoryDocument, MemoryStore, Notice, PaperError, PaperObserver, Query, RenderMode,
    Router, Scene, SceneConfig, System,
};
use std::rc::Rc;
use wasm_bindgen::prelude::*;

pub mod document;
pub mod router;

pub use document::BrowserDocument;
pub use router::BrowserRouter;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
}

fn js_error(context: &str, err: PaperError) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

/// Live scene mounted on the page body
#[wasm_bindgen]
pub struct PaperApp {
    store: Rc<MemoryStore>,
    sys: System,
    observer: PaperObserver<BrowserDocument>,
}

#[wasm_bindgen]
impl PaperApp {
    /// Mount the entities in `entities` (a JSON array of `{uuid, paper}`)
    #[wasm_bindgen(constructor)]
    pub fn new(entities: &str, config: Option<String>) -> Result<PaperApp, JsValue> {
        let config = match config {
            Some(json) => SceneConfig::from_json(&json).map_err(|e| js_error("Config error", e))?,
            None => SceneConfig::browser(),
        };
        let store = Rc::new(
            MemoryStore::from_json(entities).map_err(|e| js_error("Descriptor error", e))?,
        );
        let sys: System = store.clone();

        let document = BrowserDocument::new().map_err(|e| js_error("Surface error", e))?;
        let router: Option<Rc<dyn Router>> = match config.mode {
            RenderMode::Browser => Some(Rc::new(
                BrowserRouter::new().map_err(|e| js_error("Surface error", e))?,
            ) as Rc<dyn Router>),
            RenderMode::Server => None,
        };

        let mut app = PaperApp {
            store,
            sys,
            observer: PaperObserver::new(Scene::new(document, config), router),
        };
        for entity in app.sys.query(&Query::Paper) {
            app.observer
                .resolve(&app.sys, &Notice::Changed(entity))
                .map_err(|e| js_error("Render error", e))?;
        }
        Ok(app)
    }

    /// Insert an entity and evaluate it
    pub fn add(&mut self, entity: &str) -> Result<(), JsValue> {
        let entity: Entity = serde_json::from_str(entity)
            .map_err(|e| js_error("Descriptor error", PaperError::Descriptor(e)))?;
        let entity = self.store.insert(entity);
        self.observer
            .resolve(&self.sys, &Notice::Changed(entity))
            .map_err(|e| js_error("Render error", e))
    }

    pub fn navigate(&self, url: &str) {
        self.observer.shared().navigate(&self.sys, url);
    }

    #[wasm_bindgen(getter, js_name = currentPath)]
    pub fn current_path(&self) -> Result<String, JsValue> {
        self.observer
            .shared()
            .try_scene()
            .map(|scene| scene.current_path().to_string())
            .map_err(|e| js_error("Scene error", e))
    }

    /// Load requests issued so far, as a JSON array
    pub fn requests(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.store.requests())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

/// Render entities at `path` without a browser and return the body markup
#[wasm_bindgen(js_name = renderToString)]
pub fn render_to_string(entities: &str, path: &str) -> Result<String, JsValue> {
    let store = MemoryStore::from_json(entities).map_err(|e| js_error("Descriptor error", e))?;
    let sys: System = Rc::new(store);
    let mut scene = Scene::new(MemoryDocument::new(), SceneConfig::server());
    scene
        .page_change(&sys, path)
        .map_err(|e| js_error("Render error", e))?;
    Ok(scene.document().to_html())
}
