mod cgi;
mod config;
mod error;
mod errors;
mod fs;
mod handlers;
mod http;
mod logging;
mod mime;
mod net;
mod router;
mod upload;

use std::env;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

use error::ServerError;
use net::{EventLoop, Limits};

/// Set by `handle_sigint`; `EventLoop::run` checks it once per iteration
/// (`spec.md` §6: "SIGINT exits after logging a shutdown line").
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_signum: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

fn main() {
    logging::init();

    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "webserv".to_string());
    let config_path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: {program} <config_path>");
            process::exit(1);
        }
    };

    if let Err(e) = run(Path::new(&config_path)) {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run(config_path: &Path) -> Result<(), ServerError> {
    let groups = config::load(config_path)?;
    log::info!("configuration loaded: {} listener group(s)", groups.len());

    unsafe {
        libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t);
    }

    let mut event_loop = EventLoop::new(groups, Limits::default())?;
    event_loop.run(&SHUTDOWN)?;

    log::info!("shutdown requested, exiting");
    Ok(())
}
