use std::cell::RefCell;
use std::rc::Rc;

use mdcollab_protocol::{decode, encode, ClientMessage};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, CloseEvent, ErrorEvent, MessageEvent, WebSocket};

use crate::dom::set_status;
use crate::App;

const DEFAULT_WS_PORT: u16 = 9001;
const RECONNECT_DELAY_MS: i32 = 1000;

/// Room named by the page's own `?room=`, still percent-encoded
fn room_param(search: &str) -> Option<&str> {
    search
        .trim_start_matches('?')
        .split('&')
        .find_map(|pair| pair.strip_prefix("room="))
        .filter(|room| !room.is_empty())
}

/// WebSocket URL for the page at `hostname` with query string `search`
pub fn socket_url(secure: bool, hostname: &str, ws_port: u16, search: &str) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    match room_param(search) {
        Some(room) => format!("{scheme}://{hostname}:{ws_port}/?room={room}"),
        None => format!("{scheme}://{hostname}:{ws_port}/"),
    }
}

/// WS port from the host-provided `window.MDCOLLAB_CONFIG`
fn ws_port(window: &web_sys::Window) -> u16 {
    let port = js_sys::Reflect::get(window, &"MDCOLLAB_CONFIG".into())
        .ok()
        .filter(|config| !config.is_undefined())
        .and_then(|config| js_sys::Reflect::get(&config, &"wsPort".into()).ok())
        .and_then(|port| port.as_f64());
    match port {
        Some(port) if (1.0..=f64::from(u16::MAX)).contains(&port) => port as u16,
        _ => {
            web_sys::console::warn_1(&"MDCOLLAB_CONFIG not found, defaulting wsPort to 9001".into());
            DEFAULT_WS_PORT
        }
    }
}

fn page_socket_url() -> Result<String, JsValue> {
    let window = window().ok_or("no window")?;
    let location = window.location();
    let secure = location.protocol()? == "https:";
    Ok(socket_url(
        secure,
        &location.hostname()?,
        ws_port(&window),
        &location.search()?,
    ))
}

/// Encode and send; frames are dropped while the socket is not open
pub fn send_all(ws: &WebSocket, messages: &[ClientMessage]) {
    if ws.ready_state() != WebSocket::OPEN {
        return;
    }
    for msg in messages {
        match encode(msg) {
            Ok(bytes) => {
                if let Err(e) = ws.send_with_u8_array(&bytes) {
                    web_sys::console::error_2(&"WS: send failed".into(), &e);
                }
            }
            Err(e) => web_sys::console::error_1(&format!("WS: encode failed: {e}").into()),
        }
    }
}

fn schedule_reconnect(app: Rc<RefCell<App>>) {
    let callback = Closure::once(Box::new(move || {
        if let Err(e) = connect(&app) {
            web_sys::console::error_2(&"WS: reconnect failed".into(), &e);
            schedule_reconnect(app);
        }
    }) as Box<dyn FnOnce()>);

    if let Some(win) = window() {
        let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            RECONNECT_DELAY_MS,
        );
    }
    callback.forget();
}

/// Open the socket and wire it to the app; reconnects on close
pub fn connect(app: &Rc<RefCell<App>>) -> Result<(), JsValue> {
    let url = page_socket_url()?;
    web_sys::console::log_1(&format!("WS: connecting to {url}").into());
    set_status("connecting");

    let ws = WebSocket::new(&url)?;
    ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

    // ON OPEN
    let app_open = app.clone();
    let onopen = Closure::wrap(Box::new(move || {
        web_sys::console::log_1(&"WS: Connected".into());
        set_status("syncing");
        app_open.borrow_mut().on_open();
    }) as Box<dyn FnMut()>);
    ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
    onopen.forget();

    // ON MESSAGE
    let app_message = app.clone();
    let onmessage = Closure::wrap(Box::new(move |e: MessageEvent| {
        let Ok(abuf) = e.data().dyn_into::<js_sys::ArrayBuffer>() else {
            web_sys::console::warn_1(&"WS: ignoring non-binary frame".into());
            return;
        };
        let bytes = js_sys::Uint8Array::new(&abuf).to_vec();
        match decode(&bytes) {
            Ok(msg) => app_message.borrow_mut().on_server(msg),
            Err(e) => web_sys::console::warn_1(&format!("WS: undecodable frame: {e}").into()),
        }
    }) as Box<dyn FnMut(_)>);
    ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget();

    // ON ERROR
    let onerror = Closure::wrap(Box::new(move |_e: ErrorEvent| {
        web_sys::console::error_1(&"WS ERROR".into());
    }) as Box<dyn FnMut(_)>);
    ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
    onerror.forget();

    // ON CLOSE
    let app_close = app.clone();
    let onclose = Closure::wrap(Box::new(move |e: CloseEvent| {
        web_sys::console::warn_1(&format!("WS CLOSE: {} {}", e.code(), e.reason()).into());
        set_status("disconnected");
        app_close.borrow_mut().on_close();
        schedule_reconnect(app_close.clone());
    }) as Box<dyn FnMut(_)>);
    ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
    onclose.forget();

    app.borrow_mut().socket = Some(ws);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_comes_from_page_query() {
        assert_eq!(
            socket_url(false, "localhost", 9001, "?room=notes"),
            "ws://localhost:9001/?room=notes"
        );
        assert_eq!(
            socket_url(false, "localhost", 9001, "?theme=dark&room=team%20a"),
            "ws://localhost:9001/?room=team%20a"
        );
    }

    #[test]
    fn missing_or_empty_room_is_left_to_the_host() {
        assert_eq!(socket_url(false, "example.org", 9100, ""), "ws://example.org:9100/");
        assert_eq!(socket_url(false, "example.org", 9100, "?room="), "ws://example.org:9100/");
        assert_eq!(socket_url(true, "example.org", 9100, "?x=1"), "wss://example.org:9100/");
    }
}
