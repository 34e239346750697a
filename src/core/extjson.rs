//! Purpose: Render decoded documents as relaxed extended JSON.
//! Exports: `to_extended_json`, `to_compact_line`, `to_pretty_string`.
//! Role: Portable, type-preserving text form used by dumps and export artifacts.
//! Invariants: Field order follows the decoded document.
//! Invariants: Types JSON cannot express natively use `$`-prefixed wrappers, never lossy strings.
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Number, Value, json};

use crate::core::doc::{DocMap, Document};
use crate::core::error::{Error, ErrorKind};

pub fn to_extended_json(doc: &Document) -> Value {
    match doc {
        Document::Null => Value::Null,
        Document::Boolean(flag) => Value::Bool(*flag),
        Document::Int32(num) => json!(num),
        Document::Int64(num) => json!(num),
        Document::Double(num) => double_json(*num),
        Document::String(text) => Value::String(text.clone()),
        Document::Binary(binary) => json!({
            "$binary": {
                "base64": STANDARD.encode(&binary.bytes),
                "subType": format!("{:02x}", binary.subtype),
            }
        }),
        Document::ObjectId(oid) => json!({ "$oid": oid.to_hex() }),
        Document::DateTime(millis) => json!({ "$date": { "$numberLong": millis.to_string() } }),
        Document::Timestamp(ts) => json!({ "$timestamp": { "t": ts.time, "i": ts.increment } }),
        Document::Map(map) => map_json(map),
        Document::Array(items) => Value::Array(items.iter().map(to_extended_json).collect()),
    }
}

pub fn to_compact_line(doc: &Document) -> Result<String, Error> {
    serde_json::to_string(&to_extended_json(doc)).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to serialize json")
            .with_source(err)
    })
}

pub fn to_pretty_string(doc: &Document) -> Result<String, Error> {
    serde_json::to_string_pretty(&to_extended_json(doc)).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to serialize json")
            .with_source(err)
    })
}

fn map_json(map: &DocMap) -> Value {
    let mut out = Map::new();
    for (key, value) in map.iter() {
        out.insert(key.to_string(), to_extended_json(value));
    }
    Value::Object(out)
}

fn double_json(num: f64) -> Value {
    match Number::from_f64(num) {
        Some(number) => Value::Number(number),
        None => {
            let label = if num.is_nan() {
                "NaN"
            } else if num.is_sign_positive() {
                "Infinity"
            } else {
                "-Infinity"
            };
            json!({ "$numberDouble": label })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{to_compact_line, to_extended_json, to_pretty_string};
    use crate::core::doc::{Binary, DocMap, Document, ObjectId, Timestamp};
    use serde_json::json;

    #[test]
    fn scalars_use_native_json() {
        let doc: Document = DocMap::new()
            .with("n", Document::Null)
            .with("b", false)
            .with("i", 3i32)
            .with("l", 4i64)
            .with("s", "x")
            .into();
        assert_eq!(
            to_extended_json(&doc),
            json!({"n": null, "b": false, "i": 3, "l": 4, "s": "x"})
        );
    }

    #[test]
    fn special_types_use_wrappers() {
        let doc: Document = DocMap::new()
            .with("_id", ObjectId([0xab; 12]))
            .with(
                "blob",
                Binary {
                    subtype: 4,
                    bytes: b"hi".to_vec(),
                },
            )
            .with("at", Document::DateTime(-5))
            .with("ts", Timestamp { time: 9, increment: 1 })
            .with("nan", f64::NAN)
            .with("inf", f64::NEG_INFINITY)
            .into();
        let value = to_extended_json(&doc);
        assert_eq!(value["_id"]["$oid"], "abababababababababababab");
        assert_eq!(value["blob"]["$binary"]["base64"], "aGk=");
        assert_eq!(value["blob"]["$binary"]["subType"], "04");
        assert_eq!(value["at"]["$date"]["$numberLong"], "-5");
        assert_eq!(value["ts"]["$timestamp"]["t"], 9);
        assert_eq!(value["ts"]["$timestamp"]["i"], 1);
        assert_eq!(value["nan"]["$numberDouble"], "NaN");
        assert_eq!(value["inf"]["$numberDouble"], "-Infinity");
    }

    #[test]
    fn compact_line_keeps_field_order_and_float_marker() {
        let doc: Document = DocMap::new().with("z", 1.0f64).with("a", vec![Document::from(1i32)]).into();
        let line = to_compact_line(&doc).expect("line");
        assert_eq!(line, r#"{"z":1.0,"a":[1]}"#);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn pretty_string_is_indented() {
        let doc: Document = DocMap::new().with("k0", "v0").into();
        let text = to_pretty_string(&doc).expect("pretty");
        assert_eq!(text, "{\n  \"k0\": \"v0\"\n}");
    }
}
