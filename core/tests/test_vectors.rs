//! Verify the response codec against JSON test vectors stored in `test-vectors/`.
//!
//! Each case gives a raw PUMAPI body, the decoding mode, and either the
//! expected records or the kind of error. Records are compared as JSON
//! values, so booleans and strings must come out with the right type.

use ppms_core::{decode_single, decode_table, PpmsError};
use serde_json::Value;

fn load(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

fn error_kind(err: &PpmsError) -> &'static str {
    match err {
        PpmsError::Format { .. } => "format",
        PpmsError::NoData(_) => "no_data",
        other => panic!("unexpected error variant: {other}"),
    }
}

#[test]
fn decode_single_test_vectors() {
    for case in load(include_str!("../../test-vectors/decode_single.json")) {
        let name = case["name"].as_str().unwrap();
        let input = case["input"].as_str().unwrap();
        let graceful = case["graceful"].as_bool().unwrap();

        let result = decode_single(input, graceful);
        match case.get("error").and_then(Value::as_str) {
            Some(kind) => {
                let err = result.expect_err(name);
                assert_eq!(error_kind(&err), kind, "{name}: error kind");
            }
            None => {
                let record = result.unwrap_or_else(|e| panic!("{name}: {e}"));
                assert_eq!(serde_json::to_value(&record).unwrap(), case["expected"], "{name}");
            }
        }
    }
}

#[test]
fn decode_table_test_vectors() {
    for case in load(include_str!("../../test-vectors/decode_table.json")) {
        let name = case["name"].as_str().unwrap();
        let input = case["input"].as_str().unwrap();
        let graceful = case["graceful"].as_bool().unwrap();

        let result = decode_table(input, graceful);
        if let Some(kind) = case.get("error").and_then(Value::as_str) {
            let err = result.expect_err(name);
            assert_eq!(error_kind(&err), kind, "{name}: error kind");
            continue;
        }

        let table = result.unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(serde_json::to_value(table.records()).unwrap(), case["expected"], "{name}");
        assert_eq!(table.min_width() as u64, case["min_width"].as_u64().unwrap(), "{name}: min width");
        assert_eq!(table.max_width() as u64, case["max_width"].as_u64().unwrap(), "{name}: max width");
        assert_eq!(table.is_ragged(), table.min_width() != table.max_width(), "{name}: ragged");
    }
}
