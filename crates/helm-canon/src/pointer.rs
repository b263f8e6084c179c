//! RFC-6901 JSON-pointer helpers shared with `helm-merkle`, which enumerates
//! leaves of a CSNF document by path.

use crate::value::Value;

pub fn escape_segment(seg: &str) -> String {
    seg.replace('~', "~0").replace('/', "~1")
}

pub fn unescape_segment(seg: &str) -> String {
    seg.replace("~1", "/").replace("~0", "~")
}

pub fn join(path: &str, segment: &str) -> String {
    format!("{path}/{}", escape_segment(segment))
}

pub fn resolve<'a>(value: &'a Value, pointer: &str) -> Option<&'a Value> {
    if pointer.is_empty() {
        return Some(value);
    }
    let mut cur = value;
    for raw in pointer.trim_start_matches('/').split('/') {
        let seg = unescape_segment(raw);
        cur = match cur {
            Value::Object(map) => map.get(&seg)?,
            Value::Array(arr) => {
                let idx: usize = seg.parse().ok()?;
                arr.get(idx)?
            }
            _ => return None,
        };
    }
    Some(cur)
}
