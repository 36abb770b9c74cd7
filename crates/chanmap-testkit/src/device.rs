//! In-memory channel mapping device
//!
//! Holds inputs, outputs, the active map and pending scheduled activations.
//! Activations are validated against the routing constraints (routable
//! inputs, block size, re-ordering) and against locks held by pending
//! activations. [`Quirks`] switch individual behaviours off so the suite's
//! failure paths can be exercised.

use chanmap_core::tai::Timestamp;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use thiserror::Error;

/// Errors returned to API clients
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Output {0} is locked by a pending activation")]
    Locked(String),

    #[error("{0} not found")]
    NotFound(String),
}

/// Deliberate deviations from correct behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quirks {
    /// Accept any route, ignoring routable inputs, block size and re-ordering
    pub skip_routing_checks: bool,
    /// Accept changes to outputs with a pending activation
    pub ignore_locks: bool,
    /// Apply scheduled activations as soon as they are received
    pub apply_scheduled_immediately: bool,
    /// Report unrouted channels as `{"input": null, "channel_index": 0}`
    pub half_null_unrouted: bool,
    /// Report a different block size in `/map/io` than in the caps resource
    pub io_mismatch: bool,
    /// Answer deletes of pending activations but still apply them
    pub ignore_deletes: bool,
    /// Report immediate activations as active but apply them a little later
    pub defer_immediate: bool,
}

/// How late an immediate activation lands under [`Quirks::defer_immediate`]
pub const DEFERRED_IMMEDIATE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct InputDef {
    pub parent_id: Option<String>,
    pub parent_type: Option<String>,
    pub channels: Vec<String>,
    pub block_size: usize,
    pub reordering: bool,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct OutputDef {
    pub source_id: Option<String>,
    pub channels: Vec<String>,
    pub routable_inputs: Option<Vec<Option<String>>>,
    pub name: String,
    pub description: String,
}

/// Request body of `POST /map/activations`
#[derive(Debug, Clone, Deserialize)]
pub struct ActivationRequest {
    pub activation: ActivationSpec,
    #[serde(default)]
    pub action: BTreeMap<String, BTreeMap<String, RouteSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivationSpec {
    pub mode: String,
    #[serde(default)]
    pub requested_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteSpec {
    pub input: Option<String>,
    pub channel_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    output: String,
    channel: usize,
    input: Option<(String, usize)>,
}

#[derive(Debug, Clone)]
struct Pending {
    routes: Vec<Route>,
    resource: Value,
    /// Deferred immediate activations do not hold locks
    locks: bool,
}

/// What the handler must do after a successful submission
#[derive(Debug, Clone)]
pub struct Submitted {
    pub id: String,
    pub resource: Value,
    /// Set when the activation is pending and must be completed later
    pub due_in: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Device {
    pub inputs: BTreeMap<String, InputDef>,
    pub outputs: BTreeMap<String, OutputDef>,
    pub quirks: Quirks,
    active: BTreeMap<String, Vec<Option<(String, usize)>>>,
    last_activation: Value,
    pending: BTreeMap<String, Pending>,
    next_id: u64,
}

impl Device {
    pub fn new(inputs: BTreeMap<String, InputDef>, outputs: BTreeMap<String, OutputDef>) -> Self {
        let active = outputs
            .iter()
            .map(|(id, output)| (id.clone(), vec![None; output.channels.len()]))
            .collect();
        Self {
            inputs,
            outputs,
            quirks: Quirks::default(),
            active,
            last_activation: json!({"mode": null, "requested_time": null, "activation_time": null}),
            pending: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    pub fn input_ids(&self) -> Vec<String> {
        self.inputs.keys().map(|id| format!("{id}/")).collect()
    }

    pub fn output_ids(&self) -> Vec<String> {
        self.outputs.keys().map(|id| format!("{id}/")).collect()
    }

    fn input(&self, id: &str) -> Result<&InputDef, DeviceError> {
        self.inputs
            .get(id)
            .ok_or_else(|| DeviceError::NotFound(format!("Input {id}")))
    }

    fn output(&self, id: &str) -> Result<&OutputDef, DeviceError> {
        self.outputs
            .get(id)
            .ok_or_else(|| DeviceError::NotFound(format!("Output {id}")))
    }

    /// `parent`, `channels`, `caps` or `properties` of an input
    pub fn input_resource(&self, id: &str, resource: &str) -> Result<Value, DeviceError> {
        let input = self.input(id)?;
        match resource {
            "parent" => Ok(json!({"id": input.parent_id, "type": input.parent_type})),
            "channels" => Ok(channels_json(&input.channels)),
            "caps" => Ok(json!({"block_size": input.block_size, "reordering": input.reordering})),
            "properties" => Ok(json!({"name": input.name, "description": input.description})),
            other => Err(DeviceError::NotFound(format!("Input resource {other}"))),
        }
    }

    /// `source_id`, `channels`, `caps` or `properties` of an output
    pub fn output_resource(&self, id: &str, resource: &str) -> Result<Value, DeviceError> {
        let output = self.output(id)?;
        match resource {
            "source_id" => Ok(json!(output.source_id)),
            "channels" => Ok(channels_json(&output.channels)),
            "caps" => Ok(match &output.routable_inputs {
                Some(routable) => json!({"routable_inputs": routable}),
                None => json!({}),
            }),
            "properties" => Ok(json!({"name": output.name, "description": output.description})),
            other => Err(DeviceError::NotFound(format!("Output resource {other}"))),
        }
    }

    pub fn io(&self) -> Result<Value, DeviceError> {
        let mut inputs = Map::new();
        for id in self.inputs.keys() {
            let mut caps = self.input_resource(id, "caps")?;
            if self.quirks.io_mismatch {
                caps["block_size"] = json!(self.inputs[id].block_size + 1);
            }
            inputs.insert(
                id.clone(),
                json!({
                    "parent": self.input_resource(id, "parent")?,
                    "channels": self.input_resource(id, "channels")?,
                    "caps": caps,
                    "properties": self.input_resource(id, "properties")?,
                }),
            );
        }
        let mut outputs = Map::new();
        for id in self.outputs.keys() {
            outputs.insert(
                id.clone(),
                json!({
                    "source_id": self.output_resource(id, "source_id")?,
                    "channels": self.output_resource(id, "channels")?,
                    "caps": self.output_resource(id, "caps")?,
                    "properties": self.output_resource(id, "properties")?,
                }),
            );
        }
        Ok(json!({"inputs": inputs, "outputs": outputs}))
    }

    fn output_map(&self, id: &str) -> Value {
        let channels: Map<String, Value> = self
            .active
            .get(id)
            .map(|channels| {
                channels
                    .iter()
                    .enumerate()
                    .map(|(index, routed)| {
                        let entry = match routed {
                            Some((input, channel)) => json!({"input": input, "channel_index": channel}),
                            None if self.quirks.half_null_unrouted => {
                                json!({"input": null, "channel_index": 0})
                            }
                            None => json!({"input": null, "channel_index": null}),
                        };
                        (index.to_string(), entry)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Value::Object(channels)
    }

    /// `/map/active`
    pub fn active(&self) -> Value {
        let map: Map<String, Value> = self
            .outputs
            .keys()
            .map(|id| (id.clone(), self.output_map(id)))
            .collect();
        json!({"activation": self.last_activation, "map": map})
    }

    /// `/map/active/{output}`
    pub fn active_output(&self, id: &str) -> Result<Value, DeviceError> {
        self.output(id)?;
        Ok(json!({"activation": self.last_activation, "map": {id: self.output_map(id)}}))
    }

    /// Pending activations keyed by id
    pub fn activations(&self) -> Value {
        let pending: Map<String, Value> = self
            .pending
            .iter()
            .map(|(id, pending)| (id.clone(), pending.resource.clone()))
            .collect();
        Value::Object(pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn submit(&mut self, request: ActivationRequest) -> Result<Submitted, DeviceError> {
        let routes = self.parse_routes(&request)?;
        if !self.quirks.skip_routing_checks {
            self.check_constraints(&routes)?;
        }
        if !self.quirks.ignore_locks {
            if let Some(route) = routes.iter().find(|r| self.is_locked(&r.output)) {
                return Err(DeviceError::Locked(route.output.clone()));
            }
        }

        let mode = request.activation.mode.as_str();
        let delay = match mode {
            "activate_immediate" => None,
            "activate_scheduled_relative" => Some(parse_time(&request.activation.requested_time)?.to_duration()),
            "activate_scheduled_absolute" => {
                Some(Timestamp::now().until(parse_time(&request.activation.requested_time)?))
            }
            other => return Err(DeviceError::BadRequest(format!("Unknown activation mode {other}"))),
        };

        let id = self.next_id.to_string();
        self.next_id += 1;
        let activation = json!({
            "mode": mode,
            "requested_time": request.activation.requested_time,
            "activation_time": delay.map(|d| Timestamp::now().checked_add(d).unwrap_or_else(Timestamp::now).to_string()),
        });
        let action = routes_json(&routes);

        match delay {
            Some(due_in) if !self.quirks.apply_scheduled_immediately => {
                let resource = json!({"id": id, "state": "pending", "activation": activation, "action": action});
                self.pending.insert(
                    id.clone(),
                    Pending {
                        routes,
                        resource: resource.clone(),
                        locks: true,
                    },
                );
                tracing::debug!(id = %id, ?due_in, "Activation scheduled");
                Ok(Submitted {
                    id,
                    resource,
                    due_in: Some(due_in),
                })
            }
            None if self.quirks.defer_immediate => {
                let resource = json!({"id": id, "state": "active", "activation": activation, "action": action});
                self.pending.insert(
                    id.clone(),
                    Pending {
                        routes,
                        resource: resource.clone(),
                        locks: false,
                    },
                );
                tracing::debug!(id = %id, "Immediate activation deferred");
                Ok(Submitted {
                    id,
                    resource,
                    due_in: Some(DEFERRED_IMMEDIATE),
                })
            }
            _ => {
                self.apply(&routes, activation.clone());
                let resource = json!({"id": id, "state": "active", "activation": activation, "action": action});
                Ok(Submitted {
                    id,
                    resource,
                    due_in: None,
                })
            }
        }
    }

    /// Apply a pending activation whose time has come. Deleted ones are gone.
    pub fn complete(&mut self, id: &str) {
        if let Some(pending) = self.pending.remove(id) {
            tracing::debug!(id, "Scheduled activation applied");
            let activation = pending.resource["activation"].clone();
            self.apply(&pending.routes, activation);
        }
    }

    pub fn delete(&mut self, id: &str) -> Result<(), DeviceError> {
        if self.quirks.ignore_deletes && self.pending.contains_key(id) {
            tracing::debug!(id, "Delete answered but activation kept");
            return Ok(());
        }
        self.pending
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DeviceError::NotFound(format!("Activation {id}")))
    }

    fn is_locked(&self, output: &str) -> bool {
        self.pending
            .values()
            .filter(|pending| pending.locks)
            .any(|pending| pending.routes.iter().any(|r| r.output == output))
    }

    fn apply(&mut self, routes: &[Route], activation: Value) {
        for route in routes {
            if let Some(slot) = self
                .active
                .get_mut(&route.output)
                .and_then(|channels| channels.get_mut(route.channel))
            {
                *slot = route.input.clone();
            }
        }
        self.last_activation = activation;
    }

    fn parse_routes(&self, request: &ActivationRequest) -> Result<Vec<Route>, DeviceError> {
        let mut routes = Vec::new();
        for (output_id, channels) in &request.action {
            let output = self
                .output(output_id)
                .map_err(|_| DeviceError::BadRequest(format!("Unknown output {output_id}")))?;
            for (channel, requested) in channels {
                let channel: usize = channel
                    .parse()
                    .map_err(|_| DeviceError::BadRequest(format!("Invalid channel {channel}")))?;
                if channel >= output.channels.len() {
                    return Err(DeviceError::BadRequest(format!(
                        "Output {output_id} has no channel {channel}"
                    )));
                }
                let input = match (&requested.input, requested.channel_index) {
                    (None, None) => None,
                    (Some(input_id), Some(index)) => {
                        let input = self
                            .input(input_id)
                            .map_err(|_| DeviceError::BadRequest(format!("Unknown input {input_id}")))?;
                        if index >= input.channels.len() {
                            return Err(DeviceError::BadRequest(format!(
                                "Input {input_id} has no channel {index}"
                            )));
                        }
                        Some((input_id.clone(), index))
                    }
                    _ => {
                        return Err(DeviceError::BadRequest(
                            "input and channel_index must both be set or both be null".to_string(),
                        ))
                    }
                };
                routes.push(Route {
                    output: output_id.clone(),
                    channel,
                    input,
                });
            }
        }
        Ok(routes)
    }

    /// Routable inputs are checked per requested route. Block size and
    /// re-ordering are checked on the map each touched output would end up
    /// with, for every input the request routes onto it.
    fn check_constraints(&self, routes: &[Route]) -> Result<(), DeviceError> {
        let mut merged: BTreeMap<&str, Vec<Option<(String, usize)>>> = BTreeMap::new();
        let mut touched: BTreeSet<(&str, &str)> = BTreeSet::new();
        for route in routes {
            let output = self.output(&route.output)?;
            let input_id = route.input.as_ref().map(|(id, _)| id.clone());
            if let Some(routable) = &output.routable_inputs {
                if !routable.contains(&input_id) {
                    return Err(DeviceError::BadRequest(format!(
                        "Output {} cannot be routed from {}",
                        route.output,
                        input_id.as_deref().unwrap_or("null")
                    )));
                }
            }
            let slots = merged
                .entry(route.output.as_str())
                .or_insert_with(|| self.active.get(&route.output).cloned().unwrap_or_default());
            if let Some(slot) = slots.get_mut(route.channel) {
                *slot = route.input.clone();
            }
            if let Some((input, _)) = &route.input {
                touched.insert((route.output.as_str(), input.as_str()));
            }
        }

        for (output_id, input_id) in touched {
            let Some(slots) = merged.get(output_id) else {
                continue;
            };
            let mut pairs: Vec<(usize, usize)> = slots
                .iter()
                .enumerate()
                .filter_map(|(channel, routed)| match routed {
                    Some((id, index)) if id == input_id => Some((*index, channel)),
                    _ => None,
                })
                .collect();
            let input = self.input(input_id)?;
            pairs.sort_unstable();
            check_blocks(input.block_size, &pairs).map_err(|msg| {
                DeviceError::BadRequest(format!("Route {input_id} -> {output_id}: {msg}"))
            })?;
            if !input.reordering && pairs.windows(2).any(|w| w[1].1 <= w[0].1) {
                return Err(DeviceError::BadRequest(format!(
                    "Input {input_id} does not allow re-ordering"
                )));
            }
        }
        Ok(())
    }
}

/// Every touched block must be routed whole, in order, onto an aligned
/// block of output channels. `pairs` is `(input channel, output channel)`
/// sorted by input channel.
fn check_blocks(block_size: usize, pairs: &[(usize, usize)]) -> Result<(), String> {
    if block_size <= 1 {
        return Ok(());
    }
    let mut blocks: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
    for &(input, output) in pairs {
        blocks.entry(input / block_size).or_default().push((input, output));
    }
    for (block, members) in blocks {
        if members.len() != block_size {
            return Err(format!("block {block} is not routed whole"));
        }
        let output_start = members[0].1;
        if output_start % block_size != 0 {
            return Err(format!("block {block} is not aligned on the output"));
        }
        if members
            .iter()
            .any(|&(input, output)| output != output_start + (input - block * block_size))
        {
            return Err(format!("block {block} is split"));
        }
    }
    Ok(())
}

fn parse_time(time: &Option<String>) -> Result<Timestamp, DeviceError> {
    let time = time
        .as_deref()
        .ok_or_else(|| DeviceError::BadRequest("Scheduled activation needs requested_time".to_string()))?;
    time.parse()
        .map_err(|e: chanmap_core::tai::TimestampParseError| DeviceError::BadRequest(e.to_string()))
}

fn channels_json(labels: &[String]) -> Value {
    Value::Array(labels.iter().map(|label| json!({"label": label})).collect())
}

fn routes_json(routes: &[Route]) -> Value {
    let mut action: Map<String, Value> = Map::new();
    for route in routes {
        let entry = match &route.input {
            Some((input, channel)) => json!({"input": input, "channel_index": channel}),
            None => json!({"input": null, "channel_index": null}),
        };
        if let Value::Object(channels) = action
            .entry(route.output.clone())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            channels.insert(route.channel.to_string(), entry);
        }
    }
    Value::Object(action)
}
