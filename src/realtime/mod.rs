//! Change notifications over the backend's Phoenix-channel websocket.
//!
//! The wire format is `{topic, event, payload, ref}` JSON frames. A channel is
//! joined with a `phx_join` carrying the `postgres_changes` filter; the server
//! then pushes one `postgres_changes` frame per matching row change.

mod socket;

pub(crate) use socket::RealtimeChannel;

use serde::{Deserialize, Serialize};

pub(crate) const HEARTBEAT_TOPIC: &str = "phoenix";
pub(crate) const HEARTBEAT_INTERVAL_MS: u64 = 25_000;

const EVENT_JOIN: &str = "phx_join";
const EVENT_LEAVE: &str = "phx_leave";
const EVENT_HEARTBEAT: &str = "heartbeat";
const EVENT_REPLY: &str = "phx_reply";
const EVENT_ERROR: &str = "phx_error";
const EVENT_CLOSE: &str = "phx_close";
const EVENT_CHANGES: &str = "postgres_changes";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// What the listener should do with one inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// A row matching the channel filter changed.
    Change,
    Joined,
    /// The server rejected or dropped the channel.
    ChannelError(String),
    Ignore,
}

/// Connection state of the change listener.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum LiveStatus {
    #[default]
    Off,
    Connecting,
    Live,
    /// Socket closed or channel dropped; stays down until the next sync.
    Lost,
}

pub(crate) fn channel_topic(user_id: &str) -> String {
    format!("realtime:user-bookmarks-{user_id}")
}

pub(crate) fn owner_filter(user_id: &str) -> String {
    format!("user_id=eq.{user_id}")
}

pub(crate) fn join_message(topic: &str, user_id: &str, access_token: &str, reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic.to_string(),
        event: EVENT_JOIN.to_string(),
        payload: serde_json::json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": "bookmarks",
                    "filter": owner_filter(user_id),
                }],
            },
            "access_token": access_token,
        }),
        reference: Some(reference.to_string()),
    }
}

pub(crate) fn leave_message(topic: &str, reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic.to_string(),
        event: EVENT_LEAVE.to_string(),
        payload: serde_json::json!({}),
        reference: Some(reference.to_string()),
    }
}

pub(crate) fn heartbeat_message(reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: HEARTBEAT_TOPIC.to_string(),
        event: EVENT_HEARTBEAT.to_string(),
        payload: serde_json::json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Classify a raw text frame for the channel `topic`. Frames for other topics
/// (heartbeat replies included) are ignored.
pub(crate) fn classify(raw: &str, topic: &str) -> Inbound {
    let Ok(msg) = serde_json::from_str::<PhoenixMessage>(raw) else {
        return Inbound::Ignore;
    };
    if msg.topic != topic {
        return Inbound::Ignore;
    }

    match msg.event.as_str() {
        EVENT_CHANGES => Inbound::Change,
        EVENT_REPLY => {
            let status = msg.payload.get("status").and_then(|v| v.as_str());
            match status {
                Some("ok") => Inbound::Joined,
                Some(other) => Inbound::ChannelError(
                    msg.payload
                        .get("response")
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| other.to_string()),
                ),
                None => Inbound::Ignore,
            }
        }
        EVENT_ERROR | EVENT_CLOSE => Inbound::ChannelError(msg.event),
        _ => Inbound::Ignore,
    }
}

/// Route one inbound frame. A change frame runs `on_change` exactly once.
pub(crate) fn dispatch(raw: &str, topic: &str, on_change: &dyn Fn()) -> Inbound {
    let inbound = classify(raw, topic);
    if inbound == Inbound::Change {
        on_change();
    }
    inbound
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "realtime:user-bookmarks-u-1";

    #[test]
    fn test_topic_and_filter() {
        assert_eq!(channel_topic("u-1"), TOPIC);
        assert_eq!(owner_filter("u-1"), "user_id=eq.u-1");
    }

    #[test]
    fn test_join_message_shape() {
        let msg = join_message(TOPIC, "u-1", "jwt", 1);
        let v = serde_json::to_value(&msg).expect("should serialize");
        assert_eq!(v["event"], "phx_join");
        assert_eq!(v["ref"], "1");
        assert_eq!(v["payload"]["access_token"], "jwt");

        let change = &v["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "*");
        assert_eq!(change["table"], "bookmarks");
        assert_eq!(change["filter"], "user_id=eq.u-1");
    }

    #[test]
    fn test_heartbeat_and_leave() {
        let hb = serde_json::to_value(heartbeat_message(7)).expect("serialize");
        assert_eq!(hb["topic"], "phoenix");
        assert_eq!(hb["event"], "heartbeat");
        assert_eq!(hb["ref"], "7");

        let leave = leave_message(TOPIC, 8);
        assert_eq!(leave.event, "phx_leave");
        assert_eq!(leave.topic, TOPIC);
    }

    #[test]
    fn test_classify_change_for_own_topic() {
        let raw = r#"{
            "topic": "realtime:user-bookmarks-u-1",
            "event": "postgres_changes",
            "payload": {"data": {"type": "INSERT", "table": "bookmarks"}, "ids": [1]},
            "ref": null
        }"#;
        assert_eq!(classify(raw, TOPIC), Inbound::Change);
        assert_eq!(classify(raw, "realtime:user-bookmarks-u-2"), Inbound::Ignore);
    }

    #[test]
    fn test_classify_replies() {
        let ok = r#"{"topic":"realtime:user-bookmarks-u-1","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert_eq!(classify(ok, TOPIC), Inbound::Joined);

        let err = r#"{"topic":"realtime:user-bookmarks-u-1","event":"phx_reply","payload":{"status":"error","response":{"reason":"bad filter"}},"ref":"1"}"#;
        assert!(matches!(classify(err, TOPIC), Inbound::ChannelError(r) if r.contains("bad filter")));

        let hb = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":"2"}"#;
        assert_eq!(classify(hb, TOPIC), Inbound::Ignore);
    }

    #[test]
    fn test_classify_garbage_and_presence() {
        assert_eq!(classify("not json", TOPIC), Inbound::Ignore);
        let presence = r#"{"topic":"realtime:user-bookmarks-u-1","event":"presence_state","payload":{}}"#;
        assert_eq!(classify(presence, TOPIC), Inbound::Ignore);
        let closed = r#"{"topic":"realtime:user-bookmarks-u-1","event":"phx_close","payload":{}}"#;
        assert_eq!(classify(closed, TOPIC), Inbound::ChannelError("phx_close".to_string()));
    }

    #[test]
    fn test_dispatch_reloads_once_per_change() {
        use std::cell::Cell;

        let reloads = Cell::new(0);
        let on_change = || reloads.set(reloads.get() + 1);

        let change = r#"{"topic":"realtime:user-bookmarks-u-1","event":"postgres_changes","payload":{"data":{"type":"DELETE"}},"ref":null}"#;
        assert_eq!(dispatch(change, TOPIC, &on_change), Inbound::Change);
        assert_eq!(reloads.get(), 1);

        let joined = r#"{"topic":"realtime:user-bookmarks-u-1","event":"phx_reply","payload":{"status":"ok"},"ref":"1"}"#;
        let heartbeat = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":"2"}"#;
        dispatch(joined, TOPIC, &on_change);
        dispatch(heartbeat, TOPIC, &on_change);
        dispatch(change, "realtime:user-bookmarks-u-2", &on_change);
        assert_eq!(reloads.get(), 1);

        dispatch(change, TOPIC, &on_change);
        assert_eq!(reloads.get(), 2);
    }
}
