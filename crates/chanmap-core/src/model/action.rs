//! Single routing instruction within an activation

use crate::http::ApiClient;
use crate::result::TestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Route an input (or nothing) onto an output.
///
/// With both channel indices omitted the action covers every channel that
/// fits: see [`Action::resolve_with`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action {
    /// `None` unroutes the output channel(s)
    pub input: Option<String>,
    pub output: String,
    pub input_channel: Option<usize>,
    pub output_channel: Option<usize>,
}

/// One resolved `(output, channel) <- (input, channel)` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRoute {
    pub output: String,
    pub output_channel: usize,
    pub input: Option<String>,
    pub input_channel: Option<usize>,
}

impl Action {
    /// Route all channels of `input` onto `output`
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            output: output.into(),
            input_channel: None,
            output_channel: None,
        }
    }

    /// Route one input channel onto one output channel
    pub fn channel(
        input: impl Into<String>,
        output: impl Into<String>,
        input_channel: usize,
        output_channel: usize,
    ) -> Self {
        Self {
            input: Some(input.into()),
            output: output.into(),
            input_channel: Some(input_channel),
            output_channel: Some(output_channel),
        }
    }

    /// Set every channel of `output` to unrouted
    pub fn unroute(output: impl Into<String>) -> Self {
        Self {
            input: None,
            output: output.into(),
            input_channel: None,
            output_channel: None,
        }
    }

    pub fn is_all_channels(&self) -> bool {
        self.input_channel.is_none() && self.output_channel.is_none()
    }

    /// Resolve against the live API, fetching channel counts and block size
    /// only when the action covers all channels.
    pub fn resolve(&self, client: &ApiClient) -> Result<Vec<ChannelRoute>, TestError> {
        if !self.is_all_channels() {
            return Ok(self.resolve_with(0, 0, 1));
        }
        let output_channels = channel_count(client, &format!("map/outputs/{}/channels", self.output))?;
        let (input_channels, block_size) = match &self.input {
            Some(input) => {
                let count = channel_count(client, &format!("map/inputs/{input}/channels"))?;
                let caps = client.get_json(&format!("map/inputs/{input}/caps"))?;
                let block = caps.get("block_size").and_then(Value::as_u64).unwrap_or(1);
                (count, usize::try_from(block).unwrap_or(1))
            }
            None => (0, 1),
        };
        Ok(self.resolve_with(output_channels, input_channels, block_size))
    }

    /// Expand the action into per-channel routes.
    ///
    /// - explicit indices: one route; a missing side mirrors the other
    /// - unroute, no index: every output channel set to null
    /// - route, no index: channel `i` to channel `i` for as many whole blocks
    ///   as fit on both sides
    pub fn resolve_with(
        &self,
        output_channels: usize,
        input_channels: usize,
        block_size: usize,
    ) -> Vec<ChannelRoute> {
        if !self.is_all_channels() {
            let output_channel = self.output_channel.or(self.input_channel).unwrap_or(0);
            let input_channel = self.input.as_ref().map(|_| {
                self.input_channel.or(self.output_channel).unwrap_or(0)
            });
            return vec![ChannelRoute {
                output: self.output.clone(),
                output_channel,
                input: self.input.clone(),
                input_channel,
            }];
        }

        let count = match self.input {
            None => output_channels,
            Some(_) => {
                let fit = output_channels.min(input_channels);
                fit - fit % block_size.max(1)
            }
        };
        (0..count)
            .map(|channel| ChannelRoute {
                output: self.output.clone(),
                output_channel: channel,
                input: self.input.clone(),
                input_channel: self.input.as_ref().map(|_| channel),
            })
            .collect()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let input = self.input.as_deref().unwrap_or("<unrouted>");
        match (self.input_channel, self.output_channel) {
            (None, None) => write!(f, "{input} -> {}", self.output),
            (i, o) => write!(
                f,
                "{input}[{}] -> {}[{}]",
                i.map_or("-".to_string(), |c| c.to_string()),
                self.output,
                o.map_or("-".to_string(), |c| c.to_string())
            ),
        }
    }
}

fn channel_count(client: &ApiClient, path: &str) -> Result<usize, TestError> {
    let channels: Vec<Value> = client.get(path)?;
    Ok(channels.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_channel_route() {
        let routes = Action::channel("in1", "out1", 3, 1).resolve_with(0, 0, 1);
        assert_eq!(
            routes,
            vec![ChannelRoute {
                output: "out1".to_string(),
                output_channel: 1,
                input: Some("in1".to_string()),
                input_channel: Some(3),
            }]
        );
    }

    #[test]
    fn test_all_channels_limited_by_smaller_side() {
        let routes = Action::new("in1", "out1").resolve_with(2, 6, 1);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].output_channel, 1);
        assert_eq!(routes[1].input_channel, Some(1));
    }

    #[test]
    fn test_all_channels_rounds_down_to_whole_blocks() {
        let routes = Action::new("in1", "out1").resolve_with(5, 8, 2);
        assert_eq!(routes.len(), 4);

        let none = Action::new("in1", "out1").resolve_with(1, 8, 2);
        assert!(none.is_empty());
    }

    #[test]
    fn test_unroute_covers_every_output_channel() {
        let routes = Action::unroute("out1").resolve_with(3, 0, 1);
        assert_eq!(routes.len(), 3);
        assert!(routes.iter().all(|r| r.input.is_none() && r.input_channel.is_none()));
    }

    #[test]
    fn test_one_sided_index_mirrors() {
        let action = Action {
            input: Some("in1".to_string()),
            output: "out1".to_string(),
            input_channel: Some(2),
            output_channel: None,
        };
        let routes = action.resolve_with(0, 0, 1);
        assert_eq!(routes[0].output_channel, 2);
        assert_eq!(routes[0].input_channel, Some(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(Action::new("in1", "out1").to_string(), "in1 -> out1");
        assert_eq!(
            Action::channel("in1", "out1", 0, 2).to_string(),
            "in1[0] -> out1[2]"
        );
    }
}
