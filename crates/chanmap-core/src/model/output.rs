//! Output resources (`/map/outputs/{id}`)

use super::action::Action;
use super::input::{Channel, Input};
use crate::http::ApiClient;
use crate::result::TestError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Routing constraints of an output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputCaps {
    /// Inputs that may feed this output; `null` entries allow unrouting.
    /// Absent means unconstrained.
    #[serde(default)]
    pub routable_inputs: Option<Vec<Option<String>>>,
}

/// Snapshot of one output and its sub-resources
#[derive(Debug, Clone)]
pub struct Output {
    pub id: String,
    source_id: Value,
    channels: Value,
    caps: Value,
    properties: Value,
    channel_list: Vec<Channel>,
    output_caps: OutputCaps,
}

impl Output {
    /// Fetch `/map/outputs/{id}/{source_id,channels,caps,properties}`
    pub fn fetch(client: &ApiClient, id: &str) -> Result<Self, TestError> {
        let base = format!("map/outputs/{id}");
        Self::from_parts(
            id,
            client.get_json(&format!("{base}/source_id"))?,
            client.get_json(&format!("{base}/channels"))?,
            client.get_json(&format!("{base}/caps"))?,
            client.get_json(&format!("{base}/properties"))?,
        )
    }

    pub fn from_parts(
        id: &str,
        source_id: Value,
        channels: Value,
        caps: Value,
        properties: Value,
    ) -> Result<Self, TestError> {
        let channel_list: Vec<Channel> = serde_json::from_value(channels.clone())?;
        let output_caps: OutputCaps = serde_json::from_value(caps.clone())?;
        Ok(Self {
            id: id.to_string(),
            source_id,
            channels,
            caps,
            properties,
            channel_list,
            output_caps,
        })
    }

    /// Id of the source this output feeds; used for loop detection
    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_str()
    }

    /// Channels of the output; an output without channels fails the test
    pub fn channel_list(&self) -> Result<&[Channel], TestError> {
        if self.channel_list.is_empty() {
            return Err(TestError::failed(format!(
                "Outputs must have at least one channel (output {} has none)",
                self.id
            )));
        }
        Ok(&self.channel_list)
    }

    pub fn channel_count(&self) -> usize {
        self.channel_list.len()
    }

    pub fn caps(&self) -> &Value {
        &self.caps
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    /// Input ids allowed by `routable_inputs`, or `None` when unconstrained
    pub fn routable_inputs(&self) -> Option<Vec<&str>> {
        self.output_caps
            .routable_inputs
            .as_ref()
            .map(|ids| ids.iter().filter_map(|id| id.as_deref()).collect())
    }

    pub fn accepts_input(&self, input_id: &str) -> bool {
        match &self.output_caps.routable_inputs {
            None => true,
            Some(ids) => ids.iter().any(|id| id.as_deref() == Some(input_id)),
        }
    }

    /// Whether channels of this output may be set to unrouted
    pub fn accepts_unrouted(&self) -> bool {
        match &self.output_caps.routable_inputs {
            None => true,
            Some(ids) => ids.iter().any(Option::is_none),
        }
    }

    /// Every input that can be routed onto this output, as all-channel actions.
    ///
    /// Inputs are kept in the order given. An input qualifies when this output
    /// accepts it, it does not feed back into this output, and at least one
    /// whole block of its channels fits on both sides.
    pub fn acceptable_test_routes(&self, inputs: &[Input]) -> Vec<Action> {
        let output_channels = self.channel_count();
        inputs
            .iter()
            .filter(|input| self.accepts_input(&input.id))
            .filter(|input| self.source_id().is_none() || input.parent_id() != self.source_id())
            .filter(|input| {
                let block = input.block_size();
                block <= input.channel_count() && block <= output_channels
            })
            .map(|input| Action::new(&input.id, &self.id))
            .collect()
    }

    /// The first of [`acceptable_test_routes`](Self::acceptable_test_routes).
    /// No qualifying input fails the test.
    pub fn find_acceptable_test_route(&self, inputs: &[Input]) -> Result<Action, TestError> {
        self.acceptable_test_routes(inputs)
            .into_iter()
            .next()
            .ok_or_else(|| {
                TestError::failed(format!(
                    "No input can be routed to output {} within its routing constraints",
                    self.id
                ))
            })
    }

    /// This output as it should appear in `/map/io`
    pub fn assemble_object(&self) -> Value {
        json!({
            "source_id": self.source_id,
            "channels": self.channels,
            "caps": self.caps,
            "properties": self.properties,
        })
    }
}

/// Fetch every output listed under `/map/outputs`
pub fn output_list(client: &ApiClient) -> Result<Vec<Output>, TestError> {
    super::list_ids(client, "map/outputs")?
        .iter()
        .map(|id| Output::fetch(client, id))
        .collect()
}
