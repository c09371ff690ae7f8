use bytes::{Bytes, BytesMut};

use crate::resp::Value;
use crate::table::Pattern;

/// Apply a key pattern to a parsed command array, prepending `prefix` to
/// every key position.
///
/// Returns `None` when the command should be forwarded unchanged: malformed
/// `numkeys` on EVAL/EVALSHA and the store variants, or an XREAD without a
/// well-formed STREAMS section. Argument counts and non-key arguments are
/// never altered; null bulk elements stay null.
pub fn rewrite_command(items: &[Value], pattern: Pattern, prefix: &[u8]) -> Option<Value> {
    let positions: Vec<usize> = match pattern {
        Pattern::Single(i) => vec![i],
        Pattern::AllFrom(i) => (i..items.len()).collect(),
        Pattern::Eval => {
            let n = numkeys(items, 2)?;
            key_range(items, 3, n)?
        }
        Pattern::ZStore => {
            let n = numkeys(items, 2)?;
            let mut ps = vec![1];
            ps.extend(key_range(items, 3, n)?);
            ps
        }
        Pattern::Xread => xread_keys(items)?,
    };

    let mut out = items.to_vec();
    for pos in positions {
        let Some(Value::Bulk(Some(key))) = out.get(pos) else {
            continue;
        };
        let namespaced = prefixed(prefix, key);
        out[pos] = Value::Bulk(Some(namespaced));
    }
    Some(Value::Array(Some(out)))
}

fn prefixed(prefix: &[u8], key: &Bytes) -> Bytes {
    let mut joined = BytesMut::with_capacity(prefix.len() + key.len());
    joined.extend_from_slice(prefix);
    joined.extend_from_slice(key);
    joined.freeze()
}

/// Numeric `numkeys` argument. Non-numeric or non-positive counts disqualify
/// the rewrite (pipelined EVAL with computed argument counts stays intact).
fn numkeys(items: &[Value], index: usize) -> Option<usize> {
    let Some(Value::Bulk(Some(raw))) = items.get(index) else {
        return None;
    };
    let n = std::str::from_utf8(raw).ok()?.parse::<i64>().ok()?;
    if n <= 0 { None } else { Some(n as usize) }
}

/// `[start .. start+count)` if that range actually fits the argument vector.
fn key_range(items: &[Value], start: usize, count: usize) -> Option<Vec<usize>> {
    let end = start.checked_add(count)?;
    if end > items.len() {
        return None;
    }
    Some((start..end).collect())
}

/// XREAD/XREADGROUP: `... STREAMS key [key ...] id [id ...]` — the section
/// after the STREAMS keyword is N keys followed by N ids.
fn xread_keys(items: &[Value]) -> Option<Vec<usize>> {
    let streams = items.iter().position(|item| {
        matches!(item, Value::Bulk(Some(b)) if b.eq_ignore_ascii_case(b"STREAMS"))
    })?;
    let rest = items.len() - (streams + 1);
    if rest == 0 || rest % 2 != 0 {
        return None;
    }
    Some((streams + 1..streams + 1 + rest / 2).collect())
}
