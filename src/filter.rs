use crate::resp::Value;

/// Rewrite a SCAN reply so the client only sees its own namespace.
///
/// A SCAN reply is a 2-element array: cursor, then an array of key bulk
/// strings. The cursor passes through untouched and surviving keys keep
/// their prefix — stripping it would double-qualify any key the client
/// subsequently reads back through the proxy.
///
/// Returns `None` for any other shape (errors included); the caller then
/// forwards the reply verbatim.
pub fn filter_scan_reply(reply: &Value, prefix: &[u8]) -> Option<Value> {
    let Value::Array(Some(items)) = reply else {
        return None;
    };
    let [cursor, Value::Array(Some(keys))] = &items[..] else {
        return None;
    };

    let kept: Vec<Value> = keys
        .iter()
        .filter(|key| matches!(key, Value::Bulk(Some(k)) if k.starts_with(prefix)))
        .cloned()
        .collect();

    Some(Value::Array(Some(vec![
        cursor.clone(),
        Value::Array(Some(kept)),
    ])))
}
