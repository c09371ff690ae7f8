use bytes::Bytes;

use crate::resp::Value;

/// A client request array viewed as a command.
///
/// `items` is the full argument vector including the command name at
/// position 0, so indices line up with the table's patterns.
#[derive(Debug)]
pub struct ParsedCommand<'a> {
    pub name_upper: String,
    pub items: &'a [Value],
}

impl ParsedCommand<'_> {
    /// Bulk-string payload at an argument position, if there is one.
    pub fn arg(&self, index: usize) -> Option<&Bytes> {
        match self.items.get(index) {
            Some(Value::Bulk(Some(b))) => Some(b),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// View a decoded value as a command.
///
/// Only a non-null Array whose first element is a non-null bulk string
/// qualifies; everything else (inline bytes, stray replies) is forwarded
/// without classification.
pub fn parse_command(value: &Value) -> Option<ParsedCommand<'_>> {
    let Value::Array(Some(items)) = value else {
        return None;
    };
    let Some(Value::Bulk(Some(name))) = items.first() else {
        return None;
    };
    Some(ParsedCommand {
        name_upper: ascii_upper(name),
        items,
    })
}

pub fn ascii_upper(bytes: &Bytes) -> String {
    bytes.iter().map(|b| b.to_ascii_uppercase() as char).collect()
}

/// Blocklist test, applied to the raw framed bytes before any parsing.
///
/// Policy: any occurrence of the ASCII letters `flush` anywhere in the
/// inbound value, case-insensitive, blocks it. This catches FLUSHDB and
/// FLUSHALL but also a key literally named `flush`.
pub fn contains_flush(raw: &[u8]) -> bool {
    raw.windows(5).any(|w| w.eq_ignore_ascii_case(b"flush"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn decoded(input: &[u8]) -> Value {
        let mut buf = BytesMut::from(input);
        crate::resp::decode(&mut buf, false).unwrap().unwrap().0
    }

    #[test]
    fn parses_command_name_and_args() {
        let value = decoded(b"*3\r\n$3\r\nset\r\n$3\r\nkey\r\n$5\r\nvalue\r\n");
        let cmd = parse_command(&value).expect("is a command");
        assert_eq!(cmd.name_upper, "SET");
        assert_eq!(cmd.len(), 3);
        assert_eq!(cmd.arg(1).unwrap().as_ref(), b"key");
        assert_eq!(cmd.arg(2).unwrap().as_ref(), b"value");
        assert!(cmd.arg(3).is_none());
    }

    #[test]
    fn null_bulk_argument_reads_as_absent() {
        let value = Value::Array(Some(vec![
            Value::Bulk(Some(Bytes::from_static(b"GET"))),
            Value::Bulk(None),
        ]));
        let cmd = parse_command(&value).unwrap();
        assert!(cmd.arg(1).is_none());
    }

    #[test]
    fn non_commands_are_rejected() {
        assert!(parse_command(&decoded(b"+OK\r\n")).is_none());
        assert!(parse_command(&decoded(b"*-1\r\n")).is_none());
        assert!(parse_command(&decoded(b"*0\r\n")).is_none());
        assert!(parse_command(&Value::Inline(Bytes::from_static(b"ping\r\n"))).is_none());
    }

    #[test]
    fn flush_scan_is_case_insensitive() {
        assert!(contains_flush(b"*1\r\n$7\r\nFLUSHDB\r\n"));
        assert!(contains_flush(b"*1\r\n$8\r\nflushall\r\n"));
        assert!(contains_flush(b"*2\r\n$3\r\nGET\r\n$5\r\nFlUsH\r\n"));
        assert!(!contains_flush(b"*2\r\n$3\r\nGET\r\n$4\r\nflus\r\n"));
        assert!(!contains_flush(b"*1\r\n$4\r\nPING\r\n"));
    }
}
