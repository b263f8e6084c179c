//! A minimal JSON Canonicalization Scheme (RFC 8785) serializer for
//! [`Value`]. Because CSNF has already reduced numbers to safe-range
//! integers, booleans, `null`, NFC strings and `BTreeMap`-ordered objects,
//! serialization here never has to make a canonicalization decision of its
//! own — it only has to avoid introducing one (stable key order, minimal
//! separators, no trailing whitespace).

use base64::Engine;

use crate::value::Value;

pub fn to_jcs_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_value(value, &mut out);
    out.into_bytes()
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::String(s) => write_json_string(s, out),
        Value::Bytes(b) => {
            write_json_string(
                &base64::engine::general_purpose::STANDARD.encode(b),
                out,
            );
        }
        Value::Array(arr) => {
            out.push('[');
            for (i, v) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(v, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(k, out);
                out.push(':');
                write_value(v, out);
            }
            out.push('}');
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
