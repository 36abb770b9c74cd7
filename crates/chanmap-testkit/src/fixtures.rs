//! Ready-made device layouts

use crate::device::{Device, InputDef, OutputDef};
use std::collections::BTreeMap;

fn labels(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix} {}", i + 1)).collect()
}

fn input(parent: &str, channels: usize, block_size: usize, reordering: bool, name: &str) -> InputDef {
    InputDef {
        parent_id: Some(parent.to_string()),
        parent_type: Some("source".to_string()),
        channels: labels(name, channels),
        block_size,
        reordering,
        name: name.to_string(),
        description: format!("{name} input"),
    }
}

fn output(source: &str, channels: usize, routable: Option<&[Option<&str>]>, name: &str) -> OutputDef {
    OutputDef {
        source_id: Some(source.to_string()),
        channels: labels(name, channels),
        routable_inputs: routable.map(|ids| ids.iter().map(|id| id.map(str::to_string)).collect()),
        name: name.to_string(),
        description: format!("{name} output"),
    }
}

/// A device that satisfies every check:
///
/// - `in1`: 2 channels, block size 1, re-ordering allowed
/// - `in2`: 4 channels, block size 2, re-ordering forbidden
/// - `out1`: 4 channels, any input
/// - `out2`: 2 channels, only `in2` or unrouted; feeds the source behind `in1`
///   so its constraint is what stops a loop
pub fn standard() -> Device {
    let inputs = BTreeMap::from([
        ("in1".to_string(), input("source-loop", 2, 1, true, "Mic")),
        ("in2".to_string(), input("source-2", 4, 2, false, "Stereo pairs")),
    ]);
    let outputs = BTreeMap::from([
        ("out1".to_string(), output("source-out1", 4, None, "Main")),
        (
            "out2".to_string(),
            output("source-loop", 2, Some(&[Some("in2"), None]), "Return"),
        ),
    ]);
    Device::new(inputs, outputs)
}

/// No routing constraints at all, so the constraint checks have nothing to test
pub fn unconstrained() -> Device {
    let inputs = BTreeMap::from([("in1".to_string(), input("source-1", 2, 1, true, "Line"))]);
    let outputs = BTreeMap::from([("out1".to_string(), output("source-out1", 2, None, "Main"))]);
    Device::new(inputs, outputs)
}

/// `out2` feeds the source behind `in1` and accepts anything
pub fn re_entrant_loop() -> Device {
    let inputs = BTreeMap::from([("in1".to_string(), input("source-loop", 2, 1, true, "Mic"))]);
    let outputs = BTreeMap::from([
        ("out1".to_string(), output("source-out1", 2, None, "Main")),
        ("out2".to_string(), output("source-loop", 2, None, "Return")),
    ]);
    Device::new(inputs, outputs)
}

/// `out1` cannot be unrouted, so whatever reaches it stays there
pub fn no_unroute() -> Device {
    let inputs = BTreeMap::from([
        ("in1".to_string(), input("source-1", 2, 1, true, "Line")),
        ("in2".to_string(), input("source-2", 2, 1, true, "Aux")),
    ]);
    let outputs = BTreeMap::from([(
        "out1".to_string(),
        output("source-out1", 2, Some(&[Some("in1"), Some("in2")]), "Main"),
    )]);
    Device::new(inputs, outputs)
}

/// `out1` takes only `in1` and cannot be unrouted
pub fn pinned_output() -> Device {
    let inputs = BTreeMap::from([("in1".to_string(), input("source-1", 2, 1, true, "Line"))]);
    let outputs = BTreeMap::from([(
        "out1".to_string(),
        output("source-out1", 2, Some(&[Some("in1")]), "Main"),
    )]);
    Device::new(inputs, outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layout() {
        let device = standard();
        assert_eq!(device.input_ids(), vec!["in1/", "in2/"]);
        assert_eq!(device.output_ids(), vec!["out1/", "out2/"]);
        assert_eq!(device.inputs["in2"].block_size, 2);
        assert!(!device.inputs["in2"].reordering);
    }

    #[test]
    fn test_loop_fixture_is_unconstrained() {
        let device = re_entrant_loop();
        let out2 = &device.outputs["out2"];
        assert_eq!(out2.source_id, device.inputs["in1"].parent_id);
        assert!(out2.routable_inputs.is_none());
    }

    #[test]
    fn test_no_unroute_fixtures_forbid_null() {
        for device in [no_unroute(), pinned_output()] {
            let routable = device.outputs["out1"].routable_inputs.as_ref().unwrap();
            assert!(!routable.contains(&None));
        }
    }
}
