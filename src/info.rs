//! `INFO` output: a handful of `# Section` blocks of `key:value` lines,
//! the same shape as the teacher's own `info_command` (grounded on
//! `cmd.rs`'s `info_command`/`genRedisInfoString`-equivalent), trimmed
//! to the sections spec §6 actually asks for: server, persistence,
//! stats, memory.

use crate::persistence::PersistenceCoordinator;
use crate::store::Keyspace;
use crate::util::now_secs;

/// `section`, when present, selects exactly one of `server`,
/// `persistence`, `stats`, `memory` (case-insensitive, lowercased by
/// the caller); `None` renders all of them, matching plain `INFO`.
pub fn render(section: Option<&str>, keyspace: &Keyspace, persistence: &PersistenceCoordinator, start_time: i64, command_count: u64) -> String {
    let want = |name: &str| section.map(|s| s == name).unwrap_or(true);
    let mut out = String::new();

    if want("server") {
        out.push_str("# Server\r\n");
        out.push_str("redis_version:redis-lite-0.1.0\r\n");
        out.push_str(&format!("uptime_in_seconds:{}\r\n", (now_secs() - start_time).max(0)));
        out.push_str("\r\n");
    }

    if want("persistence") {
        out.push_str("# Persistence\r\n");
        out.push_str(&format!("rdb_enabled:{}\r\n", persistence.rdb_enabled() as u8));
        out.push_str(&format!("aof_enabled:{}\r\n", persistence.aof_enabled() as u8));
        out.push_str(&format!("rdb_last_save_time:{}\r\n", persistence.last_save_at()));
        out.push_str(&format!("rdb_last_bgsave_status:{}\r\n", if persistence.last_save_ok() { "ok" } else { "err" }));
        if let Some(err) = persistence.last_save_error() {
            out.push_str(&format!("rdb_last_bgsave_error:{err}\r\n"));
        }
        out.push_str("\r\n");
    }

    if want("stats") {
        out.push_str("# Stats\r\n");
        out.push_str(&format!("total_commands_processed:{command_count}\r\n"));
        out.push_str("\r\n");
    }

    if want("memory") {
        out.push_str("# Memory\r\n");
        out.push_str(&format!("keyspace_keys:{}\r\n", keyspace.len()));
        out.push_str("\r\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn single_section_omits_others() {
        let ks = Keyspace::new();
        let p = PersistenceCoordinator::new(&ServerConfig::default());
        let body = render(Some("memory"), &ks, &p, now_secs(), 0);
        assert!(body.contains("# Memory"));
        assert!(!body.contains("# Server"));
    }

    #[test]
    fn no_section_renders_all() {
        let ks = Keyspace::new();
        let p = PersistenceCoordinator::new(&ServerConfig::default());
        let body = render(None, &ks, &p, now_secs(), 0);
        assert!(body.contains("# Server"));
        assert!(body.contains("# Persistence"));
        assert!(body.contains("# Stats"));
        assert!(body.contains("# Memory"));
    }
}
