//! History-backed router
//!
//! Notifies its listener on back/forward navigation and on clicks of
//! same-origin anchors, which are turned into `pushState` navigations.

use paper::{Listener, PaperError, PaperResult, Router};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, HtmlAnchorElement, MouseEvent, Window};

type Slot = Rc<RefCell<Option<Listener>>>;

pub struct BrowserRouter {
    window: Window,
    listener: Slot,
    closures: RefCell<Vec<Closure<dyn FnMut(Event)>>>,
}

impl BrowserRouter {
    pub fn new() -> PaperResult<Self> {
        let window =
            web_sys::window().ok_or_else(|| PaperError::surface("window", "no global window"))?;
        Ok(Self {
            window,
            listener: Rc::new(RefCell::new(None)),
            closures: RefCell::new(Vec::new()),
        })
    }

    fn install(&self) -> Result<(), JsValue> {
        let on_pop = {
            let slot = Rc::clone(&self.listener);
            let window = self.window.clone();
            Closure::<dyn FnMut(Event)>::new(move |_: Event| notify(&slot, &current_url(&window)))
        };
        self.window
            .add_event_listener_with_callback("popstate", on_pop.as_ref().unchecked_ref())?;

        let on_click = {
            let slot = Rc::clone(&self.listener);
            let window = self.window.clone();
            Closure::<dyn FnMut(Event)>::new(move |event: Event| {
                if let Some(url) = intercepted_link(&window, &event) {
                    event.prevent_default();
                    let pushed = window
                        .history()
                        .and_then(|history| history.push_state_with_url(&JsValue::NULL, "", Some(&url)));
                    if let Err(err) = pushed {
                        error!(url = %url, error = ?err, "pushState failed");
                        return;
                    }
                    notify(&slot, &url);
                }
            })
        };
        let document = self
            .window
            .document()
            .ok_or_else(|| JsValue::from_str("no global document"))?;
        document.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;

        self.closures.borrow_mut().extend([on_pop, on_click]);
        Ok(())
    }
}

impl Router for BrowserRouter {
    fn listen(&self, listener: Listener) {
        let first = self.listener.borrow_mut().replace(listener).is_none();
        if first {
            if let Err(err) = self.install() {
                error!(error = ?err, "Failed to install navigation listeners");
            }
        }
    }

    fn broadcast_change(&self) {
        notify(&self.listener, &current_url(&self.window));
    }
}

fn notify(slot: &Slot, url: &str) {
    let listener = slot.borrow().clone();
    if let Some(listener) = listener {
        debug!(url, "Navigation");
        listener(url);
    }
}

fn current_url(window: &Window) -> String {
    window.location().href().unwrap_or_default()
}

/// Target url of a plain left click on a same-origin anchor
fn intercepted_link(window: &Window, event: &Event) -> Option<String> {
    if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
        if mouse.button() != 0 || mouse.ctrl_key() || mouse.meta_key() || mouse.shift_key() {
            return None;
        }
    }
    let anchor = event
        .target()?
        .dyn_into::<Element>()
        .ok()?
        .closest("a")
        .ok()??
        .dyn_into::<HtmlAnchorElement>()
        .ok()?;
    if !anchor.target().is_empty() {
        return None;
    }
    let origin = window.location().origin().ok()?;
    (anchor.origin() == origin).then(|| anchor.href())
}
