//! Activation requests (`POST /map/activations`)
//!
//! Client-observed lifecycle:
//!
//! ```text
//! Built --submit--> Pending --time--> Active
//!   |                  \--delete--> Deleted
//!   +---------------> Active | Rejected
//! ```
//!
//! Only a submitted activation has an id, so only a submitted, still
//! pending activation can be deleted or used to check locking.

use super::action::{Action, ChannelRoute};
use crate::http::{ApiClient, Submission};
use crate::result::TestError;
use crate::tai::{self, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// How far ahead a lapsed absolute time is moved when re-posting
const RESCHEDULE_OFFSET: Duration = Duration::from_secs(1);

/// Timing mode of an activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    ActivateImmediate,
    ActivateScheduledRelative,
    ActivateScheduledAbsolute,
}

impl ActivationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivationMode::ActivateImmediate => "activate_immediate",
            ActivationMode::ActivateScheduledRelative => "activate_scheduled_relative",
            ActivationMode::ActivateScheduledAbsolute => "activate_scheduled_absolute",
        }
    }

    pub fn is_scheduled(self) -> bool {
        !matches!(self, ActivationMode::ActivateImmediate)
    }
}

/// Lifecycle state as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Built,
    Pending,
    Active,
    Rejected,
    Deleted,
}

impl ActivationState {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ActivationState::Pending),
            "active" => Some(ActivationState::Active),
            "rejected" => Some(ActivationState::Rejected),
            _ => None,
        }
    }
}

/// Activation resource returned by the device
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationRecord {
    pub id: Option<String>,
    pub state: ActivationState,
    pub resource: Value,
}

impl ActivationRecord {
    /// Read id and state from a creation response.
    ///
    /// The id comes from an `id` field or, failing that, from a single
    /// top-level key wrapping the resource. Without a `state` field the state
    /// follows from the mode.
    pub fn from_response(body: &Value, mode: ActivationMode) -> Self {
        let (id, resource) = match body.as_object() {
            Some(map) => match map.get("id").and_then(Value::as_str) {
                Some(id) => (Some(id.to_string()), body),
                None if map.len() == 1 => match map.iter().next() {
                    Some((key, inner)) => (Some(key.clone()), inner),
                    None => (None, body),
                },
                None => (None, body),
            },
            None => (None, body),
        };
        let fallback = if mode.is_scheduled() {
            ActivationState::Pending
        } else {
            ActivationState::Active
        };
        let state = resource
            .get("state")
            .and_then(Value::as_str)
            .and_then(ActivationState::parse)
            .unwrap_or(fallback);
        Self {
            id,
            state,
            resource: resource.clone(),
        }
    }
}

/// Result of submitting an activation
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    Accepted(ActivationRecord),
    Rejected { status: u16, body: String },
}

/// Builder and handle for one activation request
#[derive(Debug, Clone)]
pub struct Activation {
    actions: Vec<Action>,
    pub mode: ActivationMode,
    /// `"s:ns"` offset (relative) or TAI timestamp (absolute)
    pub requested_time: Option<String>,
    id: Option<String>,
    state: ActivationState,
    submitted: Option<Value>,
}

impl Default for Activation {
    fn default() -> Self {
        Self::new(ActivationMode::ActivateImmediate)
    }
}

impl Activation {
    pub fn new(mode: ActivationMode) -> Self {
        Self {
            actions: Vec::new(),
            mode,
            requested_time: None,
            id: None,
            state: ActivationState::Built,
            submitted: None,
        }
    }

    pub fn immediate() -> Self {
        Self::new(ActivationMode::ActivateImmediate)
    }

    /// Scheduled `offset` after the device receives it
    pub fn scheduled_relative(offset: Duration) -> Self {
        Self::new(ActivationMode::ActivateScheduledRelative)
            .with_requested_time(tai::relative_offset(offset))
    }

    /// Scheduled at TAI now + `offset`; the time is fixed at construction
    pub fn scheduled_absolute(offset: Duration) -> Self {
        Self::new(ActivationMode::ActivateScheduledAbsolute).with_requested_time(tai::tai_time(offset))
    }

    pub fn with_requested_time(mut self, time: impl Into<String>) -> Self {
        self.requested_time = Some(time.into());
        self
    }

    pub fn add_action(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// Request body for this activation, resolving actions against the API
    pub fn payload(&self, client: &ApiClient) -> Result<Value, TestError> {
        let mut routes = Vec::new();
        for action in &self.actions {
            routes.extend(action.resolve(client)?);
        }
        Ok(build_payload(self.mode, self.requested_time.as_deref(), &routes))
    }

    /// Submit the activation. A 4xx answer is a [`ActivationOutcome::Rejected`]
    /// value, not an error.
    pub fn submit(&mut self, client: &ApiClient) -> Result<ActivationOutcome, TestError> {
        if self.state != ActivationState::Built {
            return Err(TestError::failed(format!(
                "Activation already submitted (state {:?})",
                self.state
            )));
        }
        let payload = self.payload(client)?;
        tracing::debug!(mode = self.mode.as_str(), actions = self.actions.len(), "Submitting activation");
        let submission = client.post_json("map/activations", &payload)?;
        self.submitted = Some(payload);
        match submission {
            Submission::Accepted { body, .. } => {
                let record = ActivationRecord::from_response(&body, self.mode);
                self.id = record.id.clone();
                self.state = record.state;
                tracing::info!(id = ?self.id, state = ?self.state, "Activation accepted");
                Ok(ActivationOutcome::Accepted(record))
            }
            Submission::Rejected { status, body } => {
                self.state = ActivationState::Rejected;
                tracing::info!(status, "Activation rejected");
                Ok(ActivationOutcome::Rejected { status, body })
            }
        }
    }

    /// Submit and require the device to accept
    pub fn fire(&mut self, client: &ApiClient) -> Result<ActivationRecord, TestError> {
        match self.submit(client)? {
            ActivationOutcome::Accepted(record) => Ok(record),
            ActivationOutcome::Rejected { status, body } => Err(TestError::Rejected { status, body }),
        }
    }

    /// Submit and report whether the device refused the request
    pub fn check_reject(&mut self, client: &ApiClient) -> Result<bool, TestError> {
        Ok(matches!(self.submit(client)?, ActivationOutcome::Rejected { .. }))
    }

    /// Fire the same request again while this activation is pending. The
    /// device must answer 423 Locked.
    pub fn check_lock(&self, client: &ApiClient) -> Result<(), TestError> {
        let Some(conflicting) = (self.state == ActivationState::Pending)
            .then(|| self.conflicting_payload())
            .flatten()
        else {
            return Err(TestError::failed(
                "Lock check needs a fired activation that is still pending",
            ));
        };
        match client.post_json("map/activations", &conflicting)? {
            Submission::Rejected { status: 423, .. } => Ok(()),
            Submission::Rejected { status, .. } => Err(TestError::failed(format!(
                "Changing a locked route returned HTTP {status} instead of 423"
            ))),
            Submission::Accepted { status, .. } => Err(TestError::failed(format!(
                "Locked route could be changed (HTTP {status})"
            ))),
        }
    }

    /// The submitted body, same mode and time. An absolute time that has
    /// already passed is moved forward so the request stays scheduled.
    fn conflicting_payload(&self) -> Option<Value> {
        let mut payload = self.submitted.clone()?;
        if self.mode == ActivationMode::ActivateScheduledAbsolute {
            let in_future = self
                .requested_time
                .as_deref()
                .and_then(|time| time.parse::<Timestamp>().ok())
                .is_some_and(|time| time > Timestamp::now());
            if !in_future {
                payload["activation"]["requested_time"] = json!(tai::tai_time(RESCHEDULE_OFFSET));
            }
        }
        Some(payload)
    }

    /// Delete a pending scheduled activation
    pub fn delete(&mut self, client: &ApiClient) -> Result<(), TestError> {
        let id = match (&self.id, self.state) {
            (Some(id), ActivationState::Pending) => id.clone(),
            _ => {
                return Err(TestError::failed(format!(
                    "Only a pending activation with an id can be deleted (state {:?})",
                    self.state
                )))
            }
        };
        match client.delete(&format!("map/activations/{id}"))? {
            Submission::Accepted { .. } => {
                self.state = ActivationState::Deleted;
                tracing::info!(id = %id, "Activation deleted");
                Ok(())
            }
            Submission::Rejected { status, body } => Err(TestError::failed(format!(
                "Could not delete activation {id}: HTTP {status} {body}"
            ))),
        }
    }
}

/// Wire body: `{"activation": {mode, requested_time}, "action": {out: {ch: {input, channel_index}}}}`
pub fn build_payload(
    mode: ActivationMode,
    requested_time: Option<&str>,
    routes: &[ChannelRoute],
) -> Value {
    let mut action = Map::new();
    for route in routes {
        let channels = action
            .entry(route.output.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(channels) = channels {
            channels.insert(
                route.output_channel.to_string(),
                json!({"input": route.input, "channel_index": route.input_channel}),
            );
        }
    }
    let requested_time = if mode.is_scheduled() {
        requested_time
    } else {
        None
    };
    json!({
        "activation": {
            "mode": mode.as_str(),
            "requested_time": requested_time,
        },
        "action": action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(output: &str, output_channel: usize, input: Option<&str>, input_channel: Option<usize>) -> ChannelRoute {
        ChannelRoute {
            output: output.to_string(),
            output_channel,
            input: input.map(str::to_string),
            input_channel,
        }
    }

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(
            serde_json::to_value(ActivationMode::ActivateScheduledRelative).unwrap(),
            "activate_scheduled_relative"
        );
        assert_eq!(ActivationMode::ActivateImmediate.as_str(), "activate_immediate");
        assert!(ActivationMode::ActivateScheduledAbsolute.is_scheduled());
    }

    #[test]
    fn test_payload_groups_by_output() {
        let routes = vec![
            route("out1", 0, Some("in1"), Some(1)),
            route("out1", 1, None, None),
            route("out2", 0, Some("in2"), Some(0)),
        ];
        let payload = build_payload(ActivationMode::ActivateScheduledRelative, Some("2:0"), &routes);
        assert_eq!(payload["activation"]["mode"], "activate_scheduled_relative");
        assert_eq!(payload["activation"]["requested_time"], "2:0");
        assert_eq!(payload["action"]["out1"]["0"], json!({"input": "in1", "channel_index": 1}));
        assert_eq!(payload["action"]["out1"]["1"], json!({"input": null, "channel_index": null}));
        assert_eq!(payload["action"]["out2"]["0"]["input"], "in2");
    }

    #[test]
    fn test_immediate_payload_has_null_time() {
        let payload = build_payload(ActivationMode::ActivateImmediate, Some("2:0"), &[]);
        assert_eq!(payload["activation"]["requested_time"], Value::Null);
    }

    #[test]
    fn test_record_with_id_field() {
        let body = json!({"id": "act-1", "state": "pending"});
        let record = ActivationRecord::from_response(&body, ActivationMode::ActivateImmediate);
        assert_eq!(record.id.as_deref(), Some("act-1"));
        assert_eq!(record.state, ActivationState::Pending);
    }

    #[test]
    fn test_record_keyed_by_id() {
        let body = json!({"7": {"activation": {"mode": "activate_scheduled_relative"}}});
        let record = ActivationRecord::from_response(&body, ActivationMode::ActivateScheduledRelative);
        assert_eq!(record.id.as_deref(), Some("7"));
        assert_eq!(record.state, ActivationState::Pending);
        assert!(record.resource.get("activation").is_some());
    }

    #[test]
    fn test_record_state_from_mode() {
        let record = ActivationRecord::from_response(&Value::Null, ActivationMode::ActivateImmediate);
        assert_eq!(record.id, None);
        assert_eq!(record.state, ActivationState::Active);
    }

    #[test]
    fn test_unfired_activation_cannot_be_deleted_or_lock_checked() {
        let client = ApiClient::new("http://127.0.0.1:1/", Duration::from_millis(200)).unwrap();
        let mut activation = Activation::scheduled_relative(Duration::from_secs(2));
        activation.add_action(Action::new("in1", "out1"));
        assert_eq!(activation.id(), None);
        assert!(matches!(activation.delete(&client), Err(TestError::Failed(_))));
        assert!(matches!(activation.check_lock(&client), Err(TestError::Failed(_))));
        assert_eq!(activation.state(), ActivationState::Built);
    }

    #[test]
    fn test_conflicting_payload_keeps_schedule() {
        let routes = vec![route("out1", 0, Some("in1"), Some(0))];
        let mut activation = Activation::scheduled_relative(Duration::from_secs(2));
        activation.submitted = Some(build_payload(activation.mode, Some("2:0"), &routes));
        let conflicting = activation.conflicting_payload().unwrap();
        assert_eq!(conflicting["activation"]["mode"], "activate_scheduled_relative");
        assert_eq!(conflicting["activation"]["requested_time"], "2:0");
        assert_eq!(conflicting["action"], activation.submitted.unwrap()["action"]);
    }

    #[test]
    fn test_conflicting_payload_moves_lapsed_absolute_time() {
        let routes = vec![route("out1", 0, Some("in1"), Some(0))];
        let mut activation = Activation::new(ActivationMode::ActivateScheduledAbsolute)
            .with_requested_time("1:0");
        activation.submitted = Some(build_payload(activation.mode, Some("1:0"), &routes));
        let conflicting = activation.conflicting_payload().unwrap();
        assert_eq!(conflicting["activation"]["mode"], "activate_scheduled_absolute");
        let time: Timestamp = conflicting["activation"]["requested_time"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(time > Timestamp::now());
    }

    #[test]
    fn test_scheduled_constructors_set_time() {
        let relative = Activation::scheduled_relative(Duration::from_secs(2));
        assert_eq!(relative.requested_time.as_deref(), Some("2:0"));
        let absolute = Activation::scheduled_absolute(Duration::from_secs(2));
        assert!(absolute.requested_time.unwrap().contains(':'));
    }
}
