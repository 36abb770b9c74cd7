//! Active routing state (`/map/active`)
//!
//! `map[output][channel]` is `{"input": id, "channel_index": n}`, or both
//! fields `null` when the output channel is unrouted.

use super::action::{Action, ChannelRoute};
use super::activation::Activation;
use super::output::Output;
use crate::http::ApiClient;
use crate::poll::Retry;
use crate::result::TestError;
use serde_json::{json, Value};

/// Snapshot of the active resource
#[derive(Debug, Clone)]
pub struct Active {
    resource: Value,
}

impl Active {
    pub fn fetch(client: &ApiClient) -> Result<Self, TestError> {
        Ok(Self {
            resource: client.get_json("map/active")?,
        })
    }

    pub fn from_resource(resource: Value) -> Self {
        Self { resource }
    }

    /// Re-read the resource from the device
    pub fn refresh(&mut self, client: &ApiClient) -> Result<(), TestError> {
        self.resource = client.get_json("map/active")?;
        Ok(())
    }

    /// The routing map, for structural comparison between snapshots
    pub fn snapshot(&self) -> &Value {
        self.resource.get("map").unwrap_or(&Value::Null)
    }

    /// The `activation` section describing what produced the current state
    pub fn activation(&self) -> Option<&Value> {
        self.resource.get("activation")
    }

    fn entry(&self, output_id: &str, channel: usize) -> Option<&Value> {
        self.snapshot()
            .get(output_id)
            .and_then(|channels| channels.get(channel.to_string()))
    }

    /// Index of the input channel routed to `output_id[channel]`
    pub fn input_channel_index(&self, output_id: &str, channel: usize) -> Option<u64> {
        self.entry(output_id, channel)
            .and_then(|e| e.get("channel_index"))
            .and_then(Value::as_u64)
    }

    /// Id of the input routed to `output_id[channel]`
    pub fn input_channel_name(&self, output_id: &str, channel: usize) -> Option<&str> {
        self.entry(output_id, channel)
            .and_then(|e| e.get("input"))
            .and_then(Value::as_str)
    }

    /// Route every channel of every output to unrouted, in one immediate
    /// activation. Outputs whose constraints forbid unrouting are left alone.
    pub fn unroute_all(client: &ApiClient, outputs: &[Output]) -> Result<(), TestError> {
        let (clearable, pinned): (Vec<&Output>, Vec<&Output>) =
            outputs.iter().partition(|o| o.accepts_unrouted());
        if !pinned.is_empty() {
            let ids: Vec<&str> = pinned.iter().map(|o| o.id.as_str()).collect();
            tracing::info!(outputs = ?ids, "Outputs cannot be unrouted, keeping their routes");
        }
        if clearable.is_empty() {
            return Ok(());
        }
        let mut activation = Activation::immediate();
        for output in clearable {
            activation.add_action(Action::unroute(&output.id));
        }
        activation.fire(client)?;
        Ok(())
    }

    /// Poll `/map/active/{output}` until every route of `action` is observed.
    pub fn assert_action_completed(
        client: &ApiClient,
        action: &Action,
        retry: Retry,
    ) -> Result<(), TestError> {
        let routes = action.resolve(client)?;
        let path = format!("map/active/{}", action.output);
        let done = retry.poll(|attempt| {
            let active = Active::from_resource(client.get_json(&path)?);
            let applied = active.shows_all(&routes);
            tracing::debug!(attempt, applied, %action, "Checking active map");
            Ok::<_, TestError>(applied)
        })?;
        if done {
            Ok(())
        } else {
            Err(TestError::failed(format!(
                "Action {action} was not reflected in the active map after {} attempt(s)",
                retry.attempts.max(1)
            )))
        }
    }

    /// True when every route is already in the map
    pub fn shows_all(&self, routes: &[ChannelRoute]) -> bool {
        routes.iter().all(|route| self.shows(route))
    }

    fn shows(&self, route: &ChannelRoute) -> bool {
        let expected = json!({"input": route.input, "channel_index": route.input_channel});
        match self.entry(&route.output, route.output_channel) {
            Some(entry) => {
                entry.get("input") == expected.get("input")
                    && entry.get("channel_index").and_then(Value::as_u64)
                        == route.input_channel.map(|c| c as u64)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Active {
        Active::from_resource(json!({
            "activation": {"mode": null, "requested_time": null, "activation_time": null},
            "map": {
                "out1": {
                    "0": {"input": "in1", "channel_index": 1},
                    "1": {"input": null, "channel_index": null},
                    "2": {"input": "in1", "channel_index": null}
                }
            }
        }))
    }

    #[test]
    fn test_channel_lookup() {
        let active = sample();
        assert_eq!(active.input_channel_index("out1", 0), Some(1));
        assert_eq!(active.input_channel_name("out1", 0), Some("in1"));
        assert_eq!(active.input_channel_index("out1", 1), None);
        assert_eq!(active.input_channel_name("out1", 1), None);
        assert_eq!(active.input_channel_name("missing", 0), None);
    }

    #[test]
    fn test_partial_null_is_visible() {
        let active = sample();
        assert!(active.input_channel_name("out1", 2).is_some());
        assert!(active.input_channel_index("out1", 2).is_none());
    }

    #[test]
    fn test_shows_route() {
        let active = sample();
        let routed = ChannelRoute {
            output: "out1".to_string(),
            output_channel: 0,
            input: Some("in1".to_string()),
            input_channel: Some(1),
        };
        let unrouted = ChannelRoute {
            output: "out1".to_string(),
            output_channel: 1,
            input: None,
            input_channel: None,
        };
        let wrong = ChannelRoute {
            input_channel: Some(0),
            ..routed.clone()
        };
        assert!(active.shows(&routed));
        assert!(active.shows(&unrouted));
        assert!(!active.shows(&wrong));
    }

    #[test]
    fn test_shows_all_needs_every_route() {
        let active = sample();
        let first = ChannelRoute {
            output: "out1".to_string(),
            output_channel: 0,
            input: Some("in1".to_string()),
            input_channel: Some(1),
        };
        let second = ChannelRoute {
            output_channel: 1,
            input_channel: Some(0),
            ..first.clone()
        };
        assert!(active.shows_all(std::slice::from_ref(&first)));
        assert!(!active.shows_all(&[first, second]));
    }

    #[test]
    fn test_snapshot_is_map_only() {
        let active = sample();
        assert!(active.snapshot().get("out1").is_some());
        assert!(active.snapshot().get("activation").is_none());
        assert!(active.activation().is_some());
    }
}
