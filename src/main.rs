use std::env;
use std::process::exit;

use log::{error, warn};

use redis_lite::config::ServerConfig;
use redis_lite::server;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = if args.len() == 2 {
        match ServerConfig::load_file(&args[1]) {
            Ok(c) => c,
            Err(e) => {
                error!("failed to load config file {}: {e}", args[1]);
                exit(1);
            }
        }
    } else if args.len() > 2 {
        eprintln!("Usage: redis-lite-server [/path/to/config]");
        exit(1);
    } else {
        warn!("no config file specified, using the default config");
        ServerConfig::default()
    };

    if let Err(e) = server::run(config) {
        error!("server exited: {e}");
        exit(1);
    }
}
