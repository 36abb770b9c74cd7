//! Input resources (`/map/inputs/{id}`)

use super::output::Output;
use crate::http::ApiClient;
use crate::result::TestError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn default_block_size() -> usize {
    1
}

/// One channel of an input or output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub label: String,
}

/// Routing capabilities of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCaps {
    /// Whether channels may be re-ordered across blocks
    #[serde(default)]
    pub reordering: bool,
    /// Number of contiguous channels that must be routed together
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

/// Snapshot of one input and its sub-resources
#[derive(Debug, Clone)]
pub struct Input {
    pub id: String,
    parent: Value,
    channels: Value,
    caps: Value,
    properties: Value,
    channel_list: Vec<Channel>,
    input_caps: InputCaps,
}

impl Input {
    /// Fetch `/map/inputs/{id}/{parent,channels,caps,properties}`
    pub fn fetch(client: &ApiClient, id: &str) -> Result<Self, TestError> {
        let base = format!("map/inputs/{id}");
        Self::from_parts(
            id,
            client.get_json(&format!("{base}/parent"))?,
            client.get_json(&format!("{base}/channels"))?,
            client.get_json(&format!("{base}/caps"))?,
            client.get_json(&format!("{base}/properties"))?,
        )
    }

    /// Build an input from already fetched sub-resource bodies
    pub fn from_parts(
        id: &str,
        parent: Value,
        channels: Value,
        caps: Value,
        properties: Value,
    ) -> Result<Self, TestError> {
        let channel_list: Vec<Channel> = serde_json::from_value(channels.clone())?;
        let mut input_caps: InputCaps = serde_json::from_value(caps.clone())?;
        input_caps.block_size = input_caps.block_size.max(1);
        Ok(Self {
            id: id.to_string(),
            parent,
            channels,
            caps,
            properties,
            channel_list,
            input_caps,
        })
    }

    /// Id of the source or receiver feeding this input, if any
    pub fn parent_id(&self) -> Option<&str> {
        self.parent.get("id").and_then(Value::as_str)
    }

    pub fn parent_type(&self) -> Option<&str> {
        self.parent.get("type").and_then(Value::as_str)
    }

    /// Channels of the input; an input without channels fails the test
    pub fn channel_list(&self) -> Result<&[Channel], TestError> {
        if self.channel_list.is_empty() {
            return Err(TestError::failed(format!(
                "Inputs must have at least one channel (input {} has none)",
                self.id
            )));
        }
        Ok(&self.channel_list)
    }

    pub fn channel_count(&self) -> usize {
        self.channel_list.len()
    }

    /// Raw caps object as served by the device
    pub fn caps(&self) -> &Value {
        &self.caps
    }

    pub fn block_size(&self) -> usize {
        self.input_caps.block_size
    }

    pub fn reordering(&self) -> bool {
        self.input_caps.reordering
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    /// Outputs whose constraints allow this input
    pub fn routable_outputs<'a>(&self, outputs: &'a [Output]) -> Vec<&'a Output> {
        outputs
            .iter()
            .filter(|output| output.accepts_input(&self.id))
            .collect()
    }

    /// This input as it should appear in `/map/io`
    pub fn assemble_object(&self) -> Value {
        json!({
            "parent": self.parent,
            "channels": self.channels,
            "caps": self.caps,
            "properties": self.properties,
        })
    }
}

/// Fetch every input listed under `/map/inputs`
pub fn input_list(client: &ApiClient) -> Result<Vec<Input>, TestError> {
    super::list_ids(client, "map/inputs")?
        .iter()
        .map(|id| Input::fetch(client, id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::input;

    #[test]
    fn test_parses_caps_and_parent() {
        let input = input("in1", 4, 2, false);
        assert_eq!(input.block_size(), 2);
        assert!(!input.reordering());
        assert_eq!(input.parent_id(), Some("src-in1"));
        assert_eq!(input.parent_type(), Some("source"));
        assert_eq!(input.channel_list().unwrap().len(), 4);
    }

    #[test]
    fn test_missing_caps_fields_default() {
        let input = Input::from_parts(
            "in1",
            json!({"id": null, "type": null}),
            json!([{"label": "L"}]),
            json!({}),
            json!({}),
        )
        .unwrap();
        assert_eq!(input.block_size(), 1);
        assert!(!input.reordering());
        assert_eq!(input.parent_id(), None);
    }

    #[test]
    fn test_empty_channel_list_fails() {
        let input = input("in9", 0, 1, true);
        let err = input.channel_list().unwrap_err();
        assert!(err.to_string().contains("in9"));
        assert_eq!(input.channel_count(), 0);
    }

    #[test]
    fn test_malformed_channels_is_format_error() {
        let result = Input::from_parts("in1", json!({}), json!({"label": "L"}), json!({}), json!({}));
        assert!(matches!(result, Err(TestError::Format(_))));
    }

    #[test]
    fn test_assemble_object_keeps_raw_bodies() {
        let input = input("in1", 1, 1, true);
        let obj = input.assemble_object();
        assert_eq!(obj["caps"], json!({"block_size": 1, "reordering": true}));
        assert_eq!(obj["channels"], json!([{"label": "ch0"}]));
        assert_eq!(obj["parent"]["type"], "source");
    }
}
