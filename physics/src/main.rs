use std::net::TcpListener;

use physics::{echo::EchoSolver, server};

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "physics=debug");
    }

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    let address = args.get(1).map(String::as_str).unwrap_or("0.0.0.0:4000");
    let compress = match args.get(2).map(|level| level.parse::<u32>()) {
        Some(Ok(level)) => Some(level),
        Some(Err(e)) => {
            log::error!("invalid compression level, {e}");
            std::process::exit(2);
        }
        None => None,
    };

    let listener = match TcpListener::bind(address) {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("could not bind {address}, {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server::serve(listener, compress, EchoSolver::default) {
        log::error!("physics server stopped, {e}");
        std::process::exit(1);
    }
}
