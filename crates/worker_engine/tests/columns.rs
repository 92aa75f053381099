use pretty_assertions::assert_eq;
use serde_json::json;
use worker_engine::ColumnEncoder;

fn encoder() -> ColumnEncoder {
    let mut encoder = ColumnEncoder::new();
    encoder.set_column_names(["age", "weight kg", "group"]);
    encoder
}

#[test]
fn options_are_encoded_only_where_meta_says_so() {
    let encoder = encoder();
    let mut options = json!({
        "variables": ["age", "weight kg"],
        "groupingVariable": "group",
        "title": "age",
        "nested": { "pairs": [["age", "group"]], "label": "group" },
        ".meta": {
            "variables": { "containsColumn": true },
            "groupingVariable": { "containsColumn": true },
            "nested": { "pairs": { "containsColumn": true } }
        }
    });
    let original = options.clone();

    encoder.encode_options(&mut options);

    assert_eq!(
        options["variables"],
        json!(["WorkerColumn_0_Encoded", "WorkerColumn_1_Encoded"])
    );
    assert_eq!(options["groupingVariable"], json!("WorkerColumn_2_Encoded"));
    assert_eq!(options["title"], json!("age"));
    assert_eq!(
        options["nested"]["pairs"],
        json!([["WorkerColumn_0_Encoded", "WorkerColumn_2_Encoded"]])
    );
    assert_eq!(options["nested"]["label"], json!("group"));
    assert_eq!(options[".meta"], original[".meta"]);

    encoder.decode_json(&mut options);
    assert_eq!(options, original);
}

#[test]
fn options_without_meta_are_untouched() {
    let encoder = encoder();
    let mut options = json!({ "variables": ["age"] });
    encoder.encode_options(&mut options);
    assert_eq!(options, json!({ "variables": ["age"] }));
}

#[test]
fn decoding_reaches_keys_and_embedded_text() {
    let encoder = encoder();
    let mut message = json!({
        "results": {
            "WorkerColumn_0_Encoded": {
                "title": "Mean of WorkerColumn_1_Encoded by WorkerColumn_2_Encoded",
                "values": [1.5, null, true]
            }
        }
    });
    encoder.decode_json(&mut message);
    assert_eq!(
        message,
        json!({
            "results": {
                "age": {
                    "title": "Mean of weight kg by group",
                    "values": [1.5, null, true]
                }
            }
        })
    );
}

#[test]
fn longer_names_win_over_their_prefixes() {
    let mut encoder = ColumnEncoder::new();
    encoder.set_column_names(["x", "x y"]);
    assert_eq!(encoder.encode_all("x y + x"), "WorkerColumn_1_Encoded + WorkerColumn_0_Encoded");
}

#[test]
fn rebuilding_replaces_the_table() {
    let mut encoder = encoder();
    encoder.set_column_names(["height"]);
    assert_eq!(encoder.len(), 1);
    assert_eq!(encoder.encode("age"), None);
    assert_eq!(encoder.encode("height"), Some("WorkerColumn_0_Encoded"));
    assert_eq!(encoder.decode("WorkerColumn_0_Encoded"), Some("height"));
}
