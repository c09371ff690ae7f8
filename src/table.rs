/// Which argument positions of a command hold keys.
///
/// Argument indices count the command name as position 0, so the common case
/// of "the key right after the command" is `Single(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// One key at a fixed position.
    Single(usize),
    /// Every argument at or past the position is a key.
    AllFrom(usize),
    /// Destination at 1, `numkeys` at 2, keys at `[3 .. 3+numkeys)`.
    ZStore,
    /// `numkeys` at 2, keys at `[3 .. 3+numkeys)`.
    Eval,
    /// Keys start after the literal `STREAMS` keyword, one per stream id.
    Xread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// Key command: rewrite per the pattern.
    Keys(Pattern),
    /// Control-plane command forwarded verbatim.
    Unprefixed,
    /// Not in the table: forwarded verbatim so new Redis commands keep
    /// working, at the cost of their keys escaping the namespace.
    Unknown,
}

pub fn classify(cmd_upper: &str) -> Class {
    if is_unprefixed(cmd_upper) {
        return Class::Unprefixed;
    }
    match key_pattern(cmd_upper) {
        Some(p) => Class::Keys(p),
        None => Class::Unknown,
    }
}

/// Commands the proxy forwards without touching any argument.
fn is_unprefixed(cmd: &str) -> bool {
    matches!(
        cmd,
        "AUTH"
            | "PING"
            | "ECHO"
            | "SELECT"
            | "INFO"
            | "CONFIG"
            | "CLIENT"
            | "SLOWLOG"
            | "MONITOR"
            | "SYNC"
            | "PSYNC"
            | "REPLCONF"
            | "MULTI"
            | "EXEC"
            | "DISCARD"
            | "UNWATCH"
            | "SCRIPT"
            | "PUBSUB"
            | "RANDOMKEY"
    )
}

fn key_pattern(cmd: &str) -> Option<Pattern> {
    // Strings.
    let single = matches!(
        cmd,
        "GET" | "SET" | "SETEX" | "SETNX" | "GETSET" | "PSETEX" | "INCR" | "DECR" | "INCRBY"
            | "DECRBY" | "INCRBYFLOAT" | "APPEND" | "STRLEN" | "GETRANGE" | "SETRANGE"
            // Hashes.
            | "HGET" | "HSET" | "HSETNX" | "HMSET" | "HMGET" | "HGETALL" | "HDEL" | "HEXISTS"
            | "HLEN" | "HKEYS" | "HVALS" | "HINCRBY" | "HINCRBYFLOAT" | "HSCAN"
            // Lists.
            | "LPUSH" | "RPUSH" | "LPOP" | "RPOP" | "LLEN" | "LINDEX" | "LSET" | "LRANGE"
            | "LTRIM" | "LREM" | "LPUSHX" | "RPUSHX" | "LINSERT"
            // Sets.
            | "SADD" | "SREM" | "SMEMBERS" | "SISMEMBER" | "SCARD" | "SPOP" | "SRANDMEMBER"
            | "SSCAN" | "SMOVE"
            // Sorted sets.
            | "ZADD" | "ZREM" | "ZSCORE" | "ZINCRBY" | "ZCARD" | "ZRANGE" | "ZREVRANGE"
            | "ZRANGEBYSCORE" | "ZREVRANGEBYSCORE" | "ZCOUNT" | "ZRANK" | "ZREVRANK"
            | "ZREMRANGEBYRANK" | "ZREMRANGEBYSCORE" | "ZRANGEBYLEX" | "ZREVRANGEBYLEX"
            | "ZREMRANGEBYLEX" | "ZLEXCOUNT" | "ZSCAN"
            // Key space.
            | "EXPIRE" | "EXPIREAT" | "TTL" | "PERSIST" | "PEXPIRE" | "PEXPIREAT" | "PTTL"
            | "TYPE" | "DUMP" | "RESTORE" | "MOVE" | "OBJECT"
            // Streams.
            | "XADD" | "XRANGE" | "XREVRANGE" | "XLEN" | "XDEL" | "XTRIM" | "XACK" | "XCLAIM"
            | "XPENDING" | "XGROUP" | "XINFO"
            // HyperLogLog.
            | "PFADD" | "PFCOUNT"
            // Bitmaps.
            | "SETBIT" | "GETBIT" | "BITCOUNT" | "BITPOS" | "BITFIELD"
            // Geo.
            | "GEOADD" | "GEOPOS" | "GEODIST" | "GEORADIUS" | "GEORADIUSBYMEMBER" | "GEOHASH"
            // Pub/sub channels share the key namespace.
            | "PUBLISH" | "SUBSCRIBE" | "UNSUBSCRIBE" | "PSUBSCRIBE" | "PUNSUBSCRIBE"
            // Transactions.
            | "WATCH"
    );
    if single {
        return Some(Pattern::Single(1));
    }

    let all_from_1 = matches!(
        cmd,
        "DEL" | "EXISTS" | "MSET" | "MGET" | "MSETNX" | "SINTER" | "SUNION" | "SDIFF"
            | "SINTERSTORE" | "SUNIONSTORE" | "SDIFFSTORE" | "PFMERGE" | "RPOPLPUSH" | "BLPOP"
            | "BRPOP" | "BRPOPLPUSH" | "RENAME" | "RENAMENX"
    );
    if all_from_1 {
        return Some(Pattern::AllFrom(1));
    }

    match cmd {
        // Argument 1 is the AND/OR/XOR/NOT operation literal, not a key.
        "BITOP" => Some(Pattern::AllFrom(2)),
        "ZINTERSTORE" | "ZUNIONSTORE" => Some(Pattern::ZStore),
        "EVAL" | "EVALSHA" => Some(Pattern::Eval),
        "XREAD" | "XREADGROUP" => Some(Pattern::Xread),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_key_commands_take_single_key() {
        for cmd in ["GET", "SET", "HGETALL", "LPUSH", "ZADD", "EXPIRE", "XADD", "PUBLISH"] {
            assert_eq!(classify(cmd), Class::Keys(Pattern::Single(1)), "{cmd}");
        }
    }

    #[test]
    fn variadic_key_commands_take_all_args() {
        for cmd in ["DEL", "MGET", "MSET", "SINTERSTORE", "RENAME", "BLPOP"] {
            assert_eq!(classify(cmd), Class::Keys(Pattern::AllFrom(1)), "{cmd}");
        }
    }

    #[test]
    fn bitop_skips_the_operation_literal() {
        assert_eq!(classify("BITOP"), Class::Keys(Pattern::AllFrom(2)));
    }

    #[test]
    fn irregular_patterns() {
        assert_eq!(classify("ZUNIONSTORE"), Class::Keys(Pattern::ZStore));
        assert_eq!(classify("ZINTERSTORE"), Class::Keys(Pattern::ZStore));
        assert_eq!(classify("EVAL"), Class::Keys(Pattern::Eval));
        assert_eq!(classify("EVALSHA"), Class::Keys(Pattern::Eval));
        assert_eq!(classify("XREAD"), Class::Keys(Pattern::Xread));
        assert_eq!(classify("XREADGROUP"), Class::Keys(Pattern::Xread));
    }

    #[test]
    fn control_plane_commands_are_unprefixed() {
        for cmd in ["AUTH", "PING", "SELECT", "MULTI", "EXEC", "SCRIPT", "RANDOMKEY"] {
            assert_eq!(classify(cmd), Class::Unprefixed, "{cmd}");
        }
    }

    #[test]
    fn unlisted_commands_fall_through() {
        assert_eq!(classify("SCAN"), Class::Unknown);
        assert_eq!(classify("KEYS"), Class::Unknown);
        assert_eq!(classify("GETDEL"), Class::Unknown);
        assert_eq!(classify("NOTACOMMAND"), Class::Unknown);
    }
}
