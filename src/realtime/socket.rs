use super::{
    channel_topic, dispatch, heartbeat_message, join_message, leave_message, Inbound,
    LiveStatus, PhoenixMessage, HEARTBEAT_INTERVAL_MS,
};
use leptos::logging::{log, warn};
use leptos_dom::helpers::{set_interval_with_handle, IntervalHandle};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

/// One joined channel on its own socket.
///
/// Dropping the value leaves the channel, stops the heartbeat and closes the
/// socket, so holding at most one of these is holding at most one subscription.
pub(crate) struct RealtimeChannel {
    topic: String,
    socket: WebSocket,
    next_ref: Rc<Cell<u64>>,
    lost: Rc<Cell<bool>>,
    heartbeat: Option<IntervalHandle>,

    // Keep the JS callbacks alive for as long as the socket is.
    _on_open: Closure<dyn FnMut()>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(ErrorEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

fn bump(counter: &Cell<u64>) -> u64 {
    let next = counter.get().saturating_add(1);
    counter.set(next);
    next
}

fn send(socket: &WebSocket, msg: &PhoenixMessage) {
    if socket.ready_state() != WebSocket::OPEN {
        return;
    }
    if let Ok(text) = serde_json::to_string(msg) {
        if let Err(e) = socket.send_with_str(&text) {
            warn!("[live-sync] send failed: {e:?}");
        }
    }
}

impl RealtimeChannel {
    /// Connect to `url` and join the bookmarks channel of `user_id`.
    /// `on_change` runs once per change frame; `on_status` follows the join
    /// and the loss of the socket or channel.
    pub fn open(
        url: &str,
        user_id: &str,
        access_token: &str,
        on_change: impl Fn() + 'static,
        on_status: impl Fn(LiveStatus) + 'static,
    ) -> Result<Self, String> {
        let socket = WebSocket::new(url).map_err(|e| format!("{e:?}"))?;
        let topic = channel_topic(user_id);
        let next_ref = Rc::new(Cell::new(0u64));
        let lost = Rc::new(Cell::new(false));
        let on_status = Rc::new(on_status);

        let on_open = {
            let socket = socket.clone();
            let join_topic = topic.clone();
            let user_id = user_id.to_string();
            let access_token = access_token.to_string();
            let next_ref = next_ref.clone();
            Closure::<dyn FnMut()>::new(move || {
                let msg = join_message(&join_topic, &user_id, &access_token, bump(&next_ref));
                send(&socket, &msg);
            })
        };

        let on_message = {
            let topic = topic.clone();
            let lost = lost.clone();
            let on_status = on_status.clone();
            Closure::<dyn FnMut(MessageEvent)>::new(move |ev: MessageEvent| {
                let Some(raw) = ev.data().as_string() else {
                    return;
                };
                match dispatch(&raw, &topic, &on_change) {
                    Inbound::Joined => {
                        log!("[live-sync] joined {topic}");
                        on_status(LiveStatus::Live);
                    }
                    Inbound::ChannelError(reason) => {
                        warn!("[live-sync] channel {topic} error: {reason}");
                        lost.set(true);
                        on_status(LiveStatus::Lost);
                    }
                    Inbound::Change | Inbound::Ignore => {}
                }
            })
        };

        let on_error = Closure::<dyn FnMut(ErrorEvent)>::new(move |ev: ErrorEvent| {
            warn!("[live-sync] socket error: {}", ev.message());
        });

        let on_close = {
            let lost = lost.clone();
            let on_status = on_status.clone();
            Closure::<dyn FnMut(CloseEvent)>::new(move |ev: CloseEvent| {
                warn!("[live-sync] socket closed ({})", ev.code());
                lost.set(true);
                on_status(LiveStatus::Lost);
            })
        };

        socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        let heartbeat = {
            let socket = socket.clone();
            let next_ref = next_ref.clone();
            set_interval_with_handle(
                move || send(&socket, &heartbeat_message(bump(&next_ref))),
                Duration::from_millis(HEARTBEAT_INTERVAL_MS),
            )
            .map_err(|e| warn!("[live-sync] heartbeat not scheduled: {e:?}"))
            .ok()
        };

        Ok(Self {
            topic,
            socket,
            next_ref,
            lost,
            heartbeat,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
            _on_close: on_close,
        })
    }

    /// False once the socket closed or the server dropped the channel.
    pub fn is_live(&self) -> bool {
        !self.lost.get()
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(h) = self.heartbeat.take() {
            h.clear();
        }

        send(&self.socket, &leave_message(&self.topic, bump(&self.next_ref)));

        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onerror(None);
        self.socket.set_onclose(None);
        if let Err(e) = self.socket.close() {
            warn!("[live-sync] close failed: {e:?}");
        }
        log!("[live-sync] left {}", self.topic);
    }
}
