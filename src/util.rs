//! Small free-standing helpers shared across the crate.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock time since the Unix epoch. Used for expiration deadlines,
/// `LASTSAVE`, and the `stat_starttime`/uptime figures in `INFO`.
pub fn timestamp() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO)
}

pub fn now_secs() -> i64 {
    timestamp().as_secs() as i64
}

pub fn now_millis() -> i64 {
    timestamp().as_millis() as i64
}

/// Parses a RESP bulk-string argument as a base-10 signed integer, the way
/// every numeric command argument (EXPIRE seconds, LRANGE indices, ZADD
/// scores' integer fast path, ...) needs to.
pub fn parse_int(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.trim().parse().ok()
}

pub fn parse_float(arg: &[u8]) -> Option<f64> {
    std::str::from_utf8(arg)
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|f| !f.is_nan())
}

/// Clamp a possibly-negative "from the tail" index (as used by LRANGE,
/// BITCOUNT, GETRANGE-style ranges) against a known length, the way
/// spec §4.2 / §4.3 describe for lists and bitmaps.
pub fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len_i = len as i64;
    let norm = |i: i64| -> i64 {
        if i < 0 {
            (len_i + i).max(0)
        } else {
            i
        }
    };
    let mut start = norm(start);
    let mut stop = norm(stop);
    if stop >= len_i {
        stop = len_i - 1;
    }
    if start > stop || start >= len_i {
        return None;
    }
    if start < 0 {
        start = 0;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_range_clamps_and_handles_negatives() {
        assert_eq!(normalize_range(0, -1, 5), Some((0, 4)));
        assert_eq!(normalize_range(-3, -1, 5), Some((2, 4)));
        assert_eq!(normalize_range(3, 1, 5), None);
        assert_eq!(normalize_range(10, 20, 5), None);
        assert_eq!(normalize_range(0, 0, 0), None);
    }

    #[test]
    fn parse_int_rejects_garbage() {
        assert_eq!(parse_int(b"42"), Some(42));
        assert_eq!(parse_int(b"-7"), Some(-7));
        assert_eq!(parse_int(b"abc"), None);
    }
}
