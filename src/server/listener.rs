//! TCP accept loop. Grounded on the teacher's `anet.rs`/`net.rs`
//! listener setup, generalized from a callback registered on the shared
//! epoll loop to a blocking `TcpListener::incoming()` loop that spawns
//! one thread per accepted connection (spec §5's concurrency model).

use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use log::{info, warn};

use crate::config::ServerConfig;

use super::connection;
use super::dispatcher::DispatchMsg;

pub fn run(config: &ServerConfig, dispatch_tx: mpsc::Sender<DispatchMsg>) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)?;
    info!("the server is now ready to accept connections on {addr}");

    let mut next_id: connection::ConnId = 1;
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("accept error: {e}");
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {e}");
        }
        let conn_id = next_id;
        next_id += 1;
        let tx = dispatch_tx.clone();
        thread::spawn(move || connection::handle(stream, conn_id, tx));
    }
    Ok(())
}
