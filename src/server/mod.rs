//! Server bootstrap: wires together the periodic ticker, the dispatcher
//! thread, and the TCP listener (spec §5).

mod connection;
mod dispatcher;
mod listener;

use std::sync::mpsc;
use std::thread;

use log::info;

use crate::config::ServerConfig;

pub use connection::ConnId;
pub use dispatcher::DispatchMsg;

/// Starts the ticker and dispatcher threads, then blocks the calling
/// thread in the listener's accept loop. Returns only if the listener
/// itself fails to bind; `SHUTDOWN` terminates the whole process
/// directly rather than unwinding back through this call (see
/// `dispatcher::cmd_shutdown`).
pub fn run(config: ServerConfig) -> std::io::Result<()> {
    let (tx, rx) = mpsc::channel::<DispatchMsg>();

    let ticker_tx = tx.clone();
    let sweep_interval = config.expire_sweep_interval;
    thread::spawn(move || loop {
        thread::sleep(sweep_interval);
        if ticker_tx.send(DispatchMsg::Tick).is_err() {
            return;
        }
    });

    let dispatcher_tx = tx.clone();
    let dispatcher_config = config.clone();
    thread::spawn(move || dispatcher::run(dispatcher_config, rx, dispatcher_tx));

    info!("listening on {}:{}", config.host, config.port);
    listener::run(&config, tx)
}
