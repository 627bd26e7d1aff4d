//! mdcollab browser client
//!
//! Binds the `#editor` contenteditable to a [`SyncClient`]: input and
//! selection events feed the client, its outbound messages go to the
//! socket, and inbound messages are merged into the live DOM.

pub mod dom;
mod network;
mod overlay;

use std::cell::RefCell;
use std::rc::Rc;

use mdcollab_protocol::{ClientMessage, ServerMessage};
use mdcollab_sync::{ConnectionState, Inbound, OverlayRenderer, SyncClient, SyncConfig};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlElement, WebSocket};

use crate::dom::{get_document, set_status, DomTree};
use crate::overlay::DomSurface;

/// Trailing-edge throttle check interval
const POLL_INTERVAL_MS: i32 = 25;

/// Per-tab client state shared by the event callbacks
pub struct App {
    client: SyncClient,
    doc: DomTree,
    overlay: OverlayRenderer,
    socket: Option<WebSocket>,
}

impl App {
    fn new(root: HtmlElement) -> Self {
        Self {
            client: SyncClient::new(SyncConfig::default()),
            doc: DomTree::new(root),
            overlay: OverlayRenderer::default(),
            socket: None,
        }
    }

    fn send(&self, messages: &[ClientMessage]) {
        if let Some(ws) = &self.socket {
            network::send_all(ws, messages);
        }
    }

    fn on_open(&mut self) {
        self.client.connect();
    }

    fn on_close(&mut self) {
        self.client.disconnect();
        self.socket = None;
        self.repaint();
    }

    fn on_input(&mut self) {
        let out = self.client.local_change(&self.doc);
        self.send(&out);
        self.repaint();
    }

    fn on_selection(&mut self) {
        let out = self.client.selection_change(&self.doc);
        self.send(&out);
    }

    fn on_tick(&mut self) {
        let out = self.client.poll();
        self.send(&out);
    }

    fn on_server(&mut self, msg: ServerMessage) {
        let was_synced = self.client.state() == ConnectionState::Synced;
        match self.client.handle_server(msg, &mut self.doc) {
            Inbound::Unchanged => {}
            Inbound::Document | Inbound::Cursors => self.repaint(),
        }
        if !was_synced && self.client.state() == ConnectionState::Synced {
            set_status("synced");
        }
    }

    /// Redraw every remote cursor against the current rendering
    fn repaint(&mut self) {
        let root = self.doc.root();
        if let Some(px) = overlay::font_px(root) {
            self.overlay.set_font_px(px);
        }
        let markers = self.overlay.layout(&DomSurface::new(root), self.client.other_cursors());
        if let Err(e) = overlay::paint(root, &markers) {
            web_sys::console::error_2(&"[overlay] paint failed".into(), &e);
        }
    }
}

#[wasm_bindgen(start)]
pub fn main_js() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let window = web_sys::window().ok_or("no window")?;
    let document = get_document().ok_or("no document")?;
    let Some(root) = document.get_element_by_id("editor") else {
        web_sys::console::warn_1(&"[mdcollab] no #editor on this page".into());
        return Ok(());
    };
    let root = root.dyn_into::<HtmlElement>()?;

    let app = Rc::new(RefCell::new(App::new(root.clone())));

    // Local edits
    let app_input = app.clone();
    let oninput = Closure::wrap(Box::new(move || {
        app_input.borrow_mut().on_input();
    }) as Box<dyn FnMut()>);
    root.add_event_listener_with_callback("input", oninput.as_ref().unchecked_ref())?;
    oninput.forget();

    // Caret moves without edits
    let app_selection = app.clone();
    let onselection = Closure::wrap(Box::new(move || {
        app_selection.borrow_mut().on_selection();
    }) as Box<dyn FnMut()>);
    document.add_event_listener_with_callback("selectionchange", onselection.as_ref().unchecked_ref())?;
    onselection.forget();

    // Trailing edges of the outbound throttles
    let app_tick = app.clone();
    let ontick = Closure::wrap(Box::new(move || {
        if let Ok(mut app) = app_tick.try_borrow_mut() {
            app.on_tick();
        }
    }) as Box<dyn FnMut()>);
    window.set_interval_with_callback_and_timeout_and_arguments_0(
        ontick.as_ref().unchecked_ref(),
        POLL_INTERVAL_MS,
    )?;
    ontick.forget();

    network::connect(&app)
}
