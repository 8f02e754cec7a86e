//! The single-threaded command dispatcher (spec §5): one thread owns
//! the keyspace, every connection's transaction/WATCH state, the
//! pub/sub bus, and the persistence coordinator, and processes one
//! message at a time from an mpsc channel fed by connection readers
//! and a periodic ticker. No lock is ever taken on the keyspace because
//! nothing else ever touches it.
//!
//! Grounded on the teacher's `RedisServer`/`SERVER` singleton
//! (`server.rs`) and `cmd.rs`'s `call()`, generalized per REDESIGN
//! FLAGS from a shared `Arc<RwLock<RedisServer>>` touched from multiple
//! event-loop callbacks to a single owning thread with no locking at
//! all, and from per-connection transaction state living on the
//! connection object to a `HashMap<ConnId, TxState>` the dispatcher
//! keeps (spec §9 / `transaction.rs`'s own module doc).
//! `MULTI`/`EXEC`/`WATCH`/`UNWATCH`, `SUBSCRIBE`/`UNSUBSCRIBE`/
//! `PUBLISH`/`PUBSUB`, and `SAVE`/`BGSAVE`/`LASTSAVE`/`INFO`/`SHUTDOWN`
//! are handled directly here rather than through [`crate::command`],
//! mirroring the teacher's own split between `multi_command`/
//! `exec_command`/`subscribe_command` and the generic `call()` path.

use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use log::{error, info, warn};

use crate::command;
use crate::config::ServerConfig;
use crate::error::RedisError;
use crate::persistence::{self, PersistenceCoordinator};
use crate::protocol::Reply;
use crate::pubsub::PubSubBus;
use crate::store::Keyspace;
use crate::transaction::TxState;
use crate::util::now_secs;

use super::connection::ConnId;

/// Every event the dispatcher thread reacts to.
pub enum DispatchMsg {
    Connect { conn_id: ConnId, outbox: mpsc::Sender<Vec<u8>> },
    Disconnect { conn_id: ConnId },
    Command { conn_id: ConnId, argv: Vec<Bytes> },
    /// Fired by a background-save thread once `rdb::save` returns.
    BackgroundSaveDone { dirty_baseline: u64, result: Result<(), String> },
    Tick,
}

struct Dispatcher {
    keyspace: Keyspace,
    txs: HashMap<ConnId, TxState>,
    pubsub: PubSubBus,
    persistence: PersistenceCoordinator,
    conns: HashMap<ConnId, mpsc::Sender<Vec<u8>>>,
    self_tx: mpsc::Sender<DispatchMsg>,
    command_count: u64,
    start_time: i64,
    shutting_down: bool,
}

/// Boots the dispatcher: recovers state from AOF/RDB, then drains
/// `rx` until a `SHUTDOWN` sets `shutting_down` (at which point the
/// admin handler has already scheduled a grace-period process exit).
pub fn run(config: ServerConfig, rx: mpsc::Receiver<DispatchMsg>, self_tx: mpsc::Sender<DispatchMsg>) {
    let keyspace = recover(&config);
    let mut coordinator = PersistenceCoordinator::new(&config);
    if coordinator.aof_enabled() {
        if let Err(e) = coordinator.open_aof() {
            error!("failed to open AOF for appending: {e}");
        }
    }

    let mut dispatcher = Dispatcher {
        keyspace,
        txs: HashMap::new(),
        pubsub: PubSubBus::new(),
        persistence: coordinator,
        conns: HashMap::new(),
        self_tx,
        command_count: 0,
        start_time: now_secs(),
        shutting_down: false,
    };

    info!("dispatcher ready with {} keys", dispatcher.keyspace.len());

    for msg in rx {
        dispatcher.handle(msg);
        if dispatcher.shutting_down {
            break;
        }
    }
}

/// Startup recovery (spec §4.8): AOF replay takes priority over the
/// RDB snapshot when both are enabled and present; replay/load failure
/// aborts the process with a diagnostic, matching the teacher's own
/// `process::exit` on a corrupt dump.
fn recover(config: &ServerConfig) -> Keyspace {
    if config.aof_enabled {
        let path = config.aof_path();
        if path.exists() {
            return replay_aof(&path);
        }
    }
    if config.rdb_enabled {
        let path = config.rdb_path();
        if path.exists() {
            match persistence::rdb::load(&path) {
                Ok(keyspace) => {
                    info!("loaded {} keys from {}", keyspace.len(), path.display());
                    return keyspace;
                }
                Err(e) => {
                    error!("RDB load failed, refusing to start: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
    Keyspace::new()
}

fn replay_aof(path: &Path) -> Keyspace {
    let commands = match persistence::aof::read_commands(path) {
        Ok(commands) => commands,
        Err(e) => {
            error!("AOF replay failed, refusing to start: {e}");
            std::process::exit(1);
        }
    };
    let mut keyspace = Keyspace::new();
    let total = commands.len();
    for argv in commands {
        if argv.is_empty() {
            continue;
        }
        let name = String::from_utf8_lossy(&argv[0]).to_ascii_lowercase();
        if let Err(e) = command::dispatch(&name, &argv, &mut keyspace) {
            warn!("AOF replay: command {name} failed: {e}");
        }
    }
    keyspace.reset_dirty();
    info!("replayed {total} commands from {}", path.display());
    keyspace
}

fn err_reply(e: &RedisError) -> Reply {
    Reply::error(e.prefix(), e.to_string())
}

impl Dispatcher {
    fn handle(&mut self, msg: DispatchMsg) {
        match msg {
            DispatchMsg::Connect { conn_id, outbox } => {
                self.conns.insert(conn_id, outbox);
            }
            DispatchMsg::Disconnect { conn_id } => {
                self.conns.remove(&conn_id);
                self.txs.remove(&conn_id);
                self.pubsub.remove_connection(conn_id);
            }
            DispatchMsg::Command { conn_id, argv } => {
                self.command_count += 1;
                self.handle_command(conn_id, argv);
            }
            DispatchMsg::BackgroundSaveDone { dirty_baseline, result } => {
                if let Err(e) = &result {
                    error!("background save failed: {e}");
                }
                self.persistence.record_background_save_result(dirty_baseline, result);
            }
            DispatchMsg::Tick => self.on_tick(),
        }
    }

    fn on_tick(&mut self) {
        let now = now_secs();
        for key in self.keyspace.sweep_expired() {
            self.persistence.log_write(&[Bytes::from_static(b"DEL"), key]);
        }
        self.persistence.on_tick(now);
        if self.persistence.should_auto_save(self.keyspace.dirty(), now) {
            self.spawn_background_save();
        }
        if self.persistence.aof_rewrite_eligible(now) {
            self.persistence.begin_aof_rewrite();
            self.persistence.finish_aof_rewrite(&self.keyspace);
        }
    }

    fn reply(&self, conn_id: ConnId, r: Reply) {
        if let Some(tx) = self.conns.get(&conn_id) {
            let _ = tx.send(r.encode());
        }
    }

    fn reply_err(&self, conn_id: ConnId, e: RedisError) {
        self.reply(conn_id, err_reply(&e));
    }

    fn handle_command(&mut self, conn_id: ConnId, argv: Vec<Bytes>) {
        if argv.is_empty() {
            return;
        }
        let name = String::from_utf8_lossy(&argv[0]).to_ascii_lowercase();

        let in_multi = self.txs.get(&conn_id).map(TxState::in_multi).unwrap_or(false);
        if in_multi && !matches!(name.as_str(), "exec" | "discard" | "multi" | "watch" | "unwatch") {
            self.queue_in_multi(conn_id, &name, argv);
            return;
        }

        match name.as_str() {
            "multi" => self.cmd_multi(conn_id),
            "exec" => self.cmd_exec(conn_id),
            "discard" => self.cmd_discard(conn_id),
            "watch" => self.cmd_watch(conn_id, &argv),
            "unwatch" => self.cmd_unwatch(conn_id),
            "subscribe" => self.cmd_subscribe(conn_id, &argv),
            "unsubscribe" => self.cmd_unsubscribe(conn_id, &argv),
            "publish" => self.cmd_publish(conn_id, &argv),
            "pubsub" => self.cmd_pubsub(conn_id, &argv),
            "save" => self.cmd_save(conn_id),
            "bgsave" => self.cmd_bgsave(conn_id),
            "lastsave" => self.cmd_lastsave(conn_id),
            "info" => self.cmd_info(conn_id, &argv),
            "shutdown" => self.cmd_shutdown(conn_id, &argv),
            _ => self.run_data_command(conn_id, &name, &argv),
        }
    }

    /// Queues a command inside MULTI. Only commands the data-plane
    /// table recognizes (with valid arity) may be queued; anything else
    /// aborts the transaction (spec §4.6).
    fn queue_in_multi(&mut self, conn_id: ConnId, name: &str, argv: Vec<Bytes>) {
        let validity = if !command::is_known(name) {
            Err(RedisError::UnknownCommand(name.to_string()))
        } else {
            command::check_arity(name, argv.len())
        };
        let tx = self.txs.entry(conn_id).or_default();
        match validity {
            Ok(()) => {
                tx.queue_command(argv);
                self.reply(conn_id, Reply::Simple("QUEUED".to_string()));
            }
            Err(e) => {
                tx.mark_aborted();
                self.reply_err(conn_id, e);
            }
        }
    }

    fn run_data_command(&mut self, conn_id: ConnId, name: &str, argv: &[Bytes]) {
        if !command::is_known(name) {
            return self.reply_err(conn_id, RedisError::UnknownCommand(name.to_string()));
        }
        if let Err(e) = command::check_arity(name, argv.len()) {
            return self.reply_err(conn_id, e);
        }
        match command::dispatch(name, argv, &mut self.keyspace) {
            Ok(reply) => {
                if command::is_write(name) {
                    self.persistence.log_write(argv);
                }
                self.reply(conn_id, reply);
            }
            Err(e) => self.reply_err(conn_id, e),
        }
    }

    // --- MULTI/EXEC/WATCH (spec §4.6) -----------------------------------

    fn cmd_multi(&mut self, conn_id: ConnId) {
        let tx = self.txs.entry(conn_id).or_default();
        match tx.multi() {
            Ok(()) => self.reply(conn_id, Reply::ok()),
            Err(e) => self.reply_err(conn_id, e),
        }
    }

    fn cmd_discard(&mut self, conn_id: ConnId) {
        let in_multi = self.txs.get(&conn_id).map(TxState::in_multi).unwrap_or(false);
        if !in_multi {
            return self.reply_err(conn_id, RedisError::DiscardWithoutMulti);
        }
        self.txs.entry(conn_id).or_default().discard();
        self.reply(conn_id, Reply::ok());
    }

    fn cmd_watch(&mut self, conn_id: ConnId, argv: &[Bytes]) {
        if argv.len() < 2 {
            return self.reply_err(conn_id, RedisError::WrongArity("watch".into()));
        }
        let revisions: Vec<(Bytes, u64)> = argv[1..].iter().map(|k| (k.clone(), self.keyspace.revision(k))).collect();
        let tx = self.txs.entry(conn_id).or_default();
        for (key, rev) in revisions {
            if let Err(e) = tx.watch(&key, rev) {
                return self.reply_err(conn_id, e);
            }
        }
        self.reply(conn_id, Reply::ok());
    }

    fn cmd_unwatch(&mut self, conn_id: ConnId) {
        self.txs.entry(conn_id).or_default().unwatch();
        self.reply(conn_id, Reply::ok());
    }

    fn cmd_exec(&mut self, conn_id: ConnId) {
        let in_multi = self.txs.get(&conn_id).map(TxState::in_multi).unwrap_or(false);
        if !in_multi {
            return self.reply_err(conn_id, RedisError::ExecWithoutMulti);
        }
        let tx = self.txs.entry(conn_id).or_default();
        let aborted = tx.is_aborted();
        let dirty = tx.is_dirty(&self.keyspace);
        let queue = tx.take_for_exec().unwrap_or_default();

        if aborted || dirty {
            return self.reply(conn_id, Reply::NullArray);
        }

        let mut replies = Vec::with_capacity(queue.len());
        for argv in &queue {
            let name = String::from_utf8_lossy(&argv[0]).to_ascii_lowercase();
            match command::dispatch(&name, argv, &mut self.keyspace) {
                Ok(reply) => {
                    if command::is_write(&name) {
                        self.persistence.log_write(argv);
                    }
                    replies.push(reply);
                }
                Err(e) => replies.push(err_reply(&e)),
            }
        }
        self.reply(conn_id, Reply::Array(replies));
    }

    // --- SUBSCRIBE/PUBLISH (spec §4.7) ----------------------------------

    fn cmd_subscribe(&mut self, conn_id: ConnId, argv: &[Bytes]) {
        if argv.len() < 2 {
            return self.reply_err(conn_id, RedisError::WrongArity("subscribe".into()));
        }
        for channel in &argv[1..] {
            let count = self.pubsub.subscribe(conn_id, channel.clone());
            self.reply(
                conn_id,
                Reply::Array(vec![
                    Reply::bulk(Bytes::from_static(b"subscribe")),
                    Reply::bulk(channel.clone()),
                    Reply::Integer(count as i64),
                ]),
            );
        }
    }

    fn cmd_unsubscribe(&mut self, conn_id: ConnId, argv: &[Bytes]) {
        let channels = if argv.len() > 1 { argv[1..].to_vec() } else { self.pubsub.unsubscribe_all(conn_id) };
        if channels.is_empty() {
            self.reply(
                conn_id,
                Reply::Array(vec![Reply::bulk(Bytes::from_static(b"unsubscribe")), Reply::NullBulk, Reply::Integer(0)]),
            );
            return;
        }
        for channel in &channels {
            let count = self.pubsub.unsubscribe(conn_id, channel);
            self.reply(
                conn_id,
                Reply::Array(vec![
                    Reply::bulk(Bytes::from_static(b"unsubscribe")),
                    Reply::bulk(channel.clone()),
                    Reply::Integer(count as i64),
                ]),
            );
        }
    }

    fn cmd_publish(&mut self, conn_id: ConnId, argv: &[Bytes]) {
        if argv.len() != 3 {
            return self.reply_err(conn_id, RedisError::WrongArity("publish".into()));
        }
        let channel = &argv[1];
        let message = &argv[2];
        let subscribers = self.pubsub.subscribers(channel);
        for sub in &subscribers {
            self.reply(
                *sub,
                Reply::Array(vec![Reply::bulk(Bytes::from_static(b"message")), Reply::bulk(channel.clone()), Reply::bulk(message.clone())]),
            );
        }
        self.reply(conn_id, Reply::Integer(subscribers.len() as i64));
    }

    fn cmd_pubsub(&mut self, conn_id: ConnId, argv: &[Bytes]) {
        if argv.len() < 2 {
            return self.reply_err(conn_id, RedisError::WrongArity("pubsub".into()));
        }
        match String::from_utf8_lossy(&argv[1]).to_ascii_uppercase().as_str() {
            "CHANNELS" => {
                let channels = self.pubsub.active_channels();
                self.reply(conn_id, Reply::Array(channels.into_iter().map(Reply::bulk).collect()));
            }
            "NUMSUB" => {
                let mut out = Vec::with_capacity((argv.len() - 2) * 2);
                for channel in &argv[2..] {
                    out.push(Reply::bulk(channel.clone()));
                    out.push(Reply::Integer(self.pubsub.num_subscribers(channel) as i64));
                }
                self.reply(conn_id, Reply::Array(out));
            }
            // Pattern subscriptions are out of scope (spec §1 Non-goals).
            "NUMPAT" => self.reply(conn_id, Reply::Integer(0)),
            _ => self.reply_err(conn_id, RedisError::SyntaxError),
        }
    }

    // --- Admin: SAVE/BGSAVE/LASTSAVE/INFO/SHUTDOWN (spec §6 "Admin") ----

    fn cmd_save(&mut self, conn_id: ConnId) {
        match self.persistence.save_foreground(&self.keyspace) {
            Ok(()) => self.reply(conn_id, Reply::ok()),
            Err(e) => self.reply_err(conn_id, RedisError::Persistence(e)),
        }
    }

    /// A cooperative "background" save: the dispatcher thread must keep
    /// mutating the live keyspace (spec §5's single-writer rule), so
    /// this clones it and saves the clone from a spawned thread instead
    /// of blocking on disk I/O itself.
    fn cmd_bgsave(&mut self, conn_id: ConnId) {
        if !self.persistence.rdb_enabled() {
            return self.reply_err(conn_id, RedisError::Persistence("RDB persistence is disabled".to_string()));
        }
        self.spawn_background_save();
        self.reply(conn_id, Reply::Simple("Background saving started".to_string()));
    }

    fn spawn_background_save(&mut self) {
        self.persistence.begin_background_save();
        let snapshot = self.keyspace.clone();
        let dirty_baseline = self.keyspace.dirty();
        let path = self.persistence.rdb_path().to_path_buf();
        let reply_tx = self.self_tx.clone();
        thread::spawn(move || {
            let result = persistence::rdb::save(&path, &snapshot).map_err(|e| e.to_string());
            let _ = reply_tx.send(DispatchMsg::BackgroundSaveDone { dirty_baseline, result });
        });
    }

    fn cmd_lastsave(&mut self, conn_id: ConnId) {
        self.reply(conn_id, Reply::Integer(self.persistence.last_save_at()));
    }

    fn cmd_info(&mut self, conn_id: ConnId, argv: &[Bytes]) {
        let section = argv.get(1).map(|s| String::from_utf8_lossy(s).to_ascii_lowercase());
        let body = crate::info::render(section.as_deref(), &self.keyspace, &self.persistence, self.start_time, self.command_count);
        self.reply(conn_id, Reply::bulk(Bytes::from(body)));
    }

    /// Best-effort save, reply, then a short grace window before
    /// terminating the process (spec §5 "deferred task"), grounded on
    /// the teacher's own `process::exit` inside `shutdown_command`.
    fn cmd_shutdown(&mut self, conn_id: ConnId, argv: &[Bytes]) {
        let nosave = argv.get(1).map(|a| a.eq_ignore_ascii_case(b"NOSAVE")).unwrap_or(false);
        if !nosave && self.persistence.rdb_enabled() {
            if let Err(e) = self.persistence.save_foreground(&self.keyspace) {
                warn!("save before shutdown failed: {e}");
            }
        }
        self.reply(conn_id, Reply::Simple("OK - shutting down".to_string()));
        thread::spawn(|| {
            thread::sleep(Duration::from_millis(200));
            std::process::exit(0);
        });
        self.shutting_down = true;
    }
}
