//! Wire messages of the realtime websocket (Phoenix channel framing)

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::postgrest::FilterOperator;

/// A full message received or sent over the websocket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub event: ChannelEvent,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub message_ref: Option<String>,
}

/// Channel events used by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelEvent {
    PostgresChanges,
    #[serde(rename = "phx_join")]
    PhoenixJoin,
    #[serde(rename = "phx_leave")]
    PhoenixLeave,
    #[serde(rename = "phx_reply")]
    PhoenixReply,
    #[serde(rename = "phx_error")]
    PhoenixError,
    #[serde(rename = "phx_close")]
    PhoenixClose,
    Heartbeat,
    System,
    #[serde(other)]
    Other,
}

/// Row change kinds of a `postgres_changes` subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "*")]
    All,
}

/// One table change feed to subscribe to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostgresChanges {
    pub event: ChangeKind,
    pub schema: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl PostgresChanges {
    pub fn new(event: ChangeKind, table: &str) -> Self {
        Self {
            event,
            schema: "public".to_string(),
            table: table.to_string(),
            filter: None,
        }
    }

    /// Only deliver rows whose `column` equals `value`
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.filter = Some(format!("{}={}", column, FilterOperator::Eq.apply(&value.to_string())));
        self
    }
}

/// A row change delivered by the server
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub old_record: Value,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

impl ChangeEvent {
    /// Decode the new row
    pub fn record_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.record.clone())?)
    }
}

/// Build the join message for `topic`
pub fn join_message(
    topic: &str,
    changes: &[PostgresChanges],
    access_token: &str,
    message_ref: u32,
) -> Value {
    json!({
        "topic": topic,
        "event": ChannelEvent::PhoenixJoin,
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": changes,
            },
            "access_token": access_token,
        },
        "ref": message_ref.to_string(),
    })
}

/// Build a heartbeat message
pub fn heartbeat_message(message_ref: u32) -> Value {
    json!({
        "topic": "phoenix",
        "event": ChannelEvent::Heartbeat,
        "payload": {},
        "ref": message_ref.to_string(),
    })
}

/// Extract a row change from a received message
pub fn parse_change(message: &RealtimeMessage) -> Option<ChangeEvent> {
    if message.event != ChannelEvent::PostgresChanges {
        return None;
    }
    let data = message.payload.get("data")?;
    serde_json::from_value(data.clone()).ok()
}

/// Reject a join reply that reports an error
pub fn check_reply(message: &RealtimeMessage) -> Result<()> {
    if message.event != ChannelEvent::PhoenixReply {
        return Ok(());
    }
    match message.payload.get("status").and_then(|s| s.as_str()) {
        Some("error") => {
            let reason = message
                .payload
                .pointer("/response/reason")
                .and_then(|r| r.as_str())
                .unwrap_or("subscription rejected");
            Err(Error::realtime(reason))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_message_shape() {
        let changes = [PostgresChanges::new(ChangeKind::Insert, "notifications").eq("user_id", "u1")];
        let msg = join_message("realtime:inbox", &changes, "jwt", 1);
        assert_eq!(msg["event"], "phx_join");
        assert_eq!(msg["ref"], "1");
        assert_eq!(msg["payload"]["access_token"], "jwt");
        assert_eq!(
            msg["payload"]["config"]["postgres_changes"][0],
            json!({ "event": "INSERT", "schema": "public", "table": "notifications", "filter": "user_id=eq.u1" })
        );
    }

    #[test]
    fn parses_change_payload() {
        let raw = json!({
            "topic": "realtime:inbox",
            "event": "postgres_changes",
            "payload": {
                "ids": [1],
                "data": {
                    "type": "INSERT",
                    "schema": "public",
                    "table": "notifications",
                    "commit_timestamp": "2024-05-01T10:00:00Z",
                    "record": { "id": "n1", "title": "Hello" },
                    "old_record": null,
                    "columns": []
                }
            },
            "ref": null
        });
        let message: RealtimeMessage = serde_json::from_value(raw).unwrap();
        let change = parse_change(&message).unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.record["title"], "Hello");
    }

    #[test]
    fn unknown_events_and_error_replies() {
        let presence: RealtimeMessage = serde_json::from_value(json!({
            "topic": "realtime:x", "event": "presence_state", "payload": {}, "ref": null
        }))
        .unwrap();
        assert_eq!(presence.event, ChannelEvent::Other);
        assert!(parse_change(&presence).is_none());

        let reply: RealtimeMessage = serde_json::from_value(json!({
            "topic": "realtime:x", "event": "phx_reply",
            "payload": { "status": "error", "response": { "reason": "Invalid JWT" } }, "ref": "1"
        }))
        .unwrap();
        assert!(matches!(check_reply(&reply), Err(Error::Realtime(ref r)) if r == "Invalid JWT"));
    }
}
