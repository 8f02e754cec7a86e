//! Drives RDB snapshots and AOF logging/replay (spec §4.8). This module
//! owns *when* to save/log/rewrite; the actual byte-level formats live
//! in [`rdb`] and [`aof`].

pub mod aof;
pub mod rdb;

use std::fs::File;
use std::path::PathBuf;

use bytes::Bytes;
use log::{error, info, warn};

use crate::config::{AppendFsync, ServerConfig};
use crate::store::Keyspace;
use crate::types::Value;
use crate::util::now_secs;

/// Tracks everything needed to decide "should we save/rewrite/fsync
/// right now", and owns the live AOF file handle. Lives on the
/// dispatcher thread; nothing here is shared across threads except via
/// the background-save path, which works on a cloned keyspace.
pub struct PersistenceCoordinator {
    dir: PathBuf,
    rdb_enabled: bool,
    rdb_path: PathBuf,
    rdb_save_seconds: u64,
    rdb_min_changes: u64,
    last_save_at: i64,
    last_save_dirty_baseline: u64,
    last_save_ok: bool,
    last_save_error: Option<String>,
    bg_save_in_flight: bool,

    aof_enabled: bool,
    aof_path: PathBuf,
    aof_fsync: AppendFsync,
    aof_file: Option<File>,
    last_fsync_at: i64,
    aof_rewrite_check_interval_secs: i64,
    aof_rewrite_min_bytes: u64,
    aof_rewrite_in_progress: bool,
    last_rewrite_check_at: i64,
}

impl PersistenceCoordinator {
    pub fn new(config: &ServerConfig) -> Self {
        PersistenceCoordinator {
            dir: config.persistence_dir.clone(),
            rdb_enabled: config.rdb_enabled,
            rdb_path: config.rdb_path(),
            rdb_save_seconds: config.rdb_save_seconds,
            rdb_min_changes: config.rdb_min_changes,
            last_save_at: now_secs(),
            last_save_dirty_baseline: 0,
            last_save_ok: true,
            last_save_error: None,
            bg_save_in_flight: false,

            aof_enabled: config.aof_enabled,
            aof_path: config.aof_path(),
            aof_fsync: config.aof_fsync,
            aof_file: None,
            last_fsync_at: now_secs(),
            aof_rewrite_check_interval_secs: config.aof_rewrite_check_interval.as_secs() as i64,
            aof_rewrite_min_bytes: config.aof_rewrite_min_bytes,
            aof_rewrite_in_progress: false,
            last_rewrite_check_at: now_secs(),
        }
    }

    pub fn rdb_enabled(&self) -> bool {
        self.rdb_enabled
    }

    pub fn aof_enabled(&self) -> bool {
        self.aof_enabled
    }

    pub fn rdb_path(&self) -> &std::path::Path {
        &self.rdb_path
    }

    pub fn aof_path(&self) -> &std::path::Path {
        &self.aof_path
    }

    pub fn last_save_at(&self) -> i64 {
        self.last_save_at
    }

    pub fn last_save_ok(&self) -> bool {
        self.last_save_ok
    }

    pub fn last_save_error(&self) -> Option<&str> {
        self.last_save_error.as_deref()
    }

    /// Opens (creating if needed) the live AOF file for appending.
    /// Called at startup when AOF is enabled, after any replay has
    /// already read the file through a separate handle.
    pub fn open_aof(&mut self) -> std::io::Result<()> {
        if self.aof_enabled {
            self.aof_file = Some(aof::open_for_append(&self.aof_path)?);
        }
        Ok(())
    }

    /// Appends one write-classified command to the AOF, applying the
    /// `always` fsync policy inline. Failures are logged and swallowed
    /// (spec §4.10: "AOF append failure: log and continue").
    pub fn log_write(&mut self, argv: &[Bytes]) {
        if !self.aof_enabled {
            return;
        }
        let Some(file) = self.aof_file.as_mut() else {
            return;
        };
        if let Err(e) = aof::append(file, argv) {
            error!("AOF append failed: {e}");
            return;
        }
        if matches!(self.aof_fsync, AppendFsync::Always) {
            if let Err(e) = file.sync_all() {
                error!("AOF fsync failed: {e}");
            }
        }
    }

    /// Called once per tick (spec §5 "periodic timer fires"); applies
    /// the `everysec` fsync policy.
    pub fn on_tick(&mut self, now: i64) {
        if self.aof_enabled && matches!(self.aof_fsync, AppendFsync::EverySec) && now > self.last_fsync_at {
            if let Some(file) = self.aof_file.as_mut() {
                if let Err(e) = file.sync_all() {
                    error!("AOF fsync failed: {e}");
                } else {
                    self.last_fsync_at = now;
                }
            }
        }
    }

    /// Spec §4.8 auto-save rule: both the elapsed-seconds and the
    /// changes-since-last-save thresholds must be exceeded.
    pub fn should_auto_save(&self, keyspace_dirty: u64, now: i64) -> bool {
        self.rdb_enabled
            && !self.bg_save_in_flight
            && keyspace_dirty.saturating_sub(self.last_save_dirty_baseline) >= self.rdb_min_changes
            && (now - self.last_save_at) as u64 >= self.rdb_save_seconds
    }

    pub fn begin_background_save(&mut self) {
        self.bg_save_in_flight = true;
    }

    pub fn save_foreground(&mut self, keyspace: &Keyspace) -> Result<(), String> {
        match rdb::save(&self.rdb_path, keyspace) {
            Ok(()) => {
                self.last_save_at = now_secs();
                self.last_save_dirty_baseline = keyspace.dirty();
                self.last_save_ok = true;
                self.last_save_error = None;
                info!("RDB snapshot written to {}", self.rdb_path.display());
                Ok(())
            }
            Err(e) => {
                self.last_save_ok = false;
                self.last_save_error = Some(e.to_string());
                error!("RDB save failed: {e}");
                Err(e.to_string())
            }
        }
    }

    /// Called from the dispatcher thread once a spawned background-save
    /// thread reports back, at most one in flight at a time (spec
    /// §4.8).
    pub fn record_background_save_result(&mut self, dirty_baseline: u64, result: Result<(), String>) {
        self.bg_save_in_flight = false;
        match result {
            Ok(()) => {
                self.last_save_at = now_secs();
                self.last_save_dirty_baseline = dirty_baseline;
                self.last_save_ok = true;
                self.last_save_error = None;
            }
            Err(e) => {
                self.last_save_ok = false;
                self.last_save_error = Some(e);
            }
        }
    }

    pub fn aof_rewrite_eligible(&mut self, now: i64) -> bool {
        if !self.aof_enabled || self.aof_rewrite_in_progress {
            return false;
        }
        if now - self.last_rewrite_check_at < self.aof_rewrite_check_interval_secs {
            return false;
        }
        self.last_rewrite_check_at = now;
        aof::file_len(&self.aof_path) >= self.aof_rewrite_min_bytes
    }

    pub fn begin_aof_rewrite(&mut self) {
        self.aof_rewrite_in_progress = true;
    }

    /// Rewrites the AOF to an equivalent, shorter command sequence that
    /// reproduces the current state (spec §4.8), then reopens the live
    /// handle in append mode so subsequent writes land after it.
    pub fn finish_aof_rewrite(&mut self, keyspace: &Keyspace) {
        let commands = plan_rewrite(keyspace);
        match aof::rewrite(&self.aof_path, &commands) {
            Ok(()) => match aof::open_for_append(&self.aof_path) {
                Ok(file) => {
                    self.aof_file = Some(file);
                    info!("AOF rewrite completed: {} commands", commands.len());
                }
                Err(e) => error!("failed to reopen AOF after rewrite: {e}"),
            },
            Err(e) => warn!("AOF rewrite failed: {e}"),
        }
        self.aof_rewrite_in_progress = false;
    }
}

/// Builds the equivalent DML sequence that reproduces `keyspace`
/// (spec §4.8: "an equivalent DML sequence ... plus EXPIRE entries for
/// keys with TTL").
fn plan_rewrite(keyspace: &Keyspace) -> Vec<Vec<Bytes>> {
    let mut out = Vec::new();
    for (key, value, deadline) in keyspace.iter() {
        match value {
            Value::String(v) => out.push(vec![Bytes::from_static(b"SET"), key.clone(), v.clone()]),
            Value::Hash(h) => {
                let mut argv = vec![Bytes::from_static(b"HSET"), key.clone()];
                for (f, v) in h {
                    argv.push(f.clone());
                    argv.push(v.clone());
                }
                if argv.len() > 2 {
                    out.push(argv);
                }
            }
            Value::List(l) => {
                if !l.is_empty() {
                    let mut argv = vec![Bytes::from_static(b"RPUSH"), key.clone()];
                    argv.extend(l.iter().cloned());
                    out.push(argv);
                }
            }
            Value::Set(s) => {
                if !s.is_empty() {
                    let mut argv = vec![Bytes::from_static(b"SADD"), key.clone()];
                    argv.extend(s.iter().cloned());
                    out.push(argv);
                }
            }
            Value::SortedSet(z) => {
                if !z.is_empty() {
                    let mut argv = vec![Bytes::from_static(b"ZADD"), key.clone()];
                    for (member, score) in z.iter_ascending() {
                        argv.push(Bytes::from(format!("{score}")));
                        argv.push(member.clone());
                    }
                    out.push(argv);
                }
            }
        }
        if let Some(deadline) = deadline {
            let remaining = (deadline - now_secs()).max(0);
            out.push(vec![
                Bytes::from_static(b"EXPIRE"),
                key.clone(),
                Bytes::from(format!("{remaining}")),
            ]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_save_requires_both_thresholds() {
        let mut config = ServerConfig::default();
        config.rdb_save_seconds = 100;
        config.rdb_min_changes = 10;
        let coord = PersistenceCoordinator::new(&config);
        assert!(!coord.should_auto_save(5, now_secs()));
        assert!(!coord.should_auto_save(20, now_secs()));
        assert!(coord.should_auto_save(20, now_secs() + 200));
    }

    #[test]
    fn rewrite_plan_includes_expire_for_ttl_keys() {
        let mut ks = Keyspace::new();
        ks.set_string(Bytes::from_static(b"k"), Bytes::from_static(b"v"));
        ks.set_expire_at(b"k", now_secs() + 50);
        let plan = plan_rewrite(&ks);
        assert!(plan.iter().any(|c| c[0] == Bytes::from_static(b"EXPIRE")));
    }
}
