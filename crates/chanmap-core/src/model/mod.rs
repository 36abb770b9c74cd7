//! Client-side views of the channel mapping API resources
//!
//! Snapshots are taken fresh in each test case and never written back;
//! the only way to change the device is an [`Activation`].

pub mod action;
pub mod activation;
pub mod active;
pub mod input;
pub mod io;
pub mod output;

pub use action::{Action, ChannelRoute};
pub use activation::{Activation, ActivationMode, ActivationOutcome, ActivationRecord, ActivationState};
pub use active::Active;
pub use input::{input_list, Channel, Input, InputCaps};
pub use io::Io;
pub use output::{output_list, Output, OutputCaps};

use crate::http::ApiClient;
use crate::result::TestError;

/// Ids listed by a collection resource (`["in1/", "in2/"]`), sorted
pub(crate) fn list_ids(client: &ApiClient, path: &str) -> Result<Vec<String>, TestError> {
    let entries: Vec<String> = client.get(path)?;
    let mut ids: Vec<String> = entries
        .into_iter()
        .map(|entry| entry.trim_end_matches('/').to_string())
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort();
    Ok(ids)
}
