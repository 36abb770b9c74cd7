//! Aggregate `/map/io` view

use super::input::Input;
use super::output::Output;
use crate::http::ApiClient;
use crate::result::TestError;
use serde_json::{json, Map, Value};

pub struct Io;

impl Io {
    /// Raw `/map/io` resource
    pub fn fetch(client: &ApiClient) -> Result<Value, TestError> {
        Ok(client.get_json("map/io")?)
    }

    /// What `/map/io` should contain given the individual resources
    pub fn assemble(inputs: &[Input], outputs: &[Output]) -> Value {
        let inputs: Map<String, Value> = inputs
            .iter()
            .map(|input| (input.id.clone(), input.assemble_object()))
            .collect();
        let outputs: Map<String, Value> = outputs
            .iter()
            .map(|output| (output.id.clone(), output.assemble_object()))
            .collect();
        json!({"inputs": inputs, "outputs": outputs})
    }
}
