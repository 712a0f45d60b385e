//! mmwave-io - Telemetry ingest daemon for the TI IWR1443 mmWave radar

mod config;
mod devices;
mod endpoint;
mod error;
mod logging;
mod reactor;
mod sink;
mod transport;

use crate::config::Config;
use crate::devices::iwr1443::{ControlHandler, DataHandler};
use crate::endpoint::SerialEndpoint;
use crate::reactor::{AsyncHandle, Reactor};
use crate::sink::RecordWriter;
use std::env;
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            logging::flush();
            eprintln!("mmwave-io: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> error::Result<()> {
    // Config path from args or default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/mmwave-io.toml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    logging::init(config.level_filter()?)?;
    log::info!("mmwave-io v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);
    log::info!(
        "Control port: {} @ {} baud, data port: {} @ {} baud",
        config.control.port,
        config.control.baud_rate,
        config.data.port,
        config.data.baud_rate
    );

    let writer = match &config.output.path {
        Some(path) => Arc::new(RecordWriter::create(path)?),
        None => Arc::new(RecordWriter::stdout()),
    };

    let control = Arc::new(SerialEndpoint::open(
        &config.control.port,
        config.control.baud_rate,
        Box::new(ControlHandler::new()),
    )?);

    let sink_writer = Arc::clone(&writer);
    let data = Arc::new(SerialEndpoint::open(
        &config.data.port,
        config.data.baud_rate,
        Box::new(DataHandler::new(Box::new(move |record: &[u8]| {
            if let Err(e) = sink_writer.write_record(record) {
                log::error!("Failed to persist frame record: {}", e);
            }
        }))),
    )?);

    let reactor = Arc::new(Reactor::new());
    reactor.register(Arc::clone(&control) as Arc<dyn AsyncHandle>)?;
    reactor.register(Arc::clone(&data) as Arc<dyn AsyncHandle>)?;

    // Ctrl-C behaves like the `exit` command, except stdin is still
    // blocked; flush what we have and leave immediately.
    {
        let reactor = Arc::clone(&reactor);
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal");
            reactor.quit();
            logging::flush();
            std::process::exit(0);
        })
        .map_err(|e| error::Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;
    }

    let reactor_thread = {
        let reactor = Arc::clone(&reactor);
        thread::Builder::new()
            .name("reactor".to_string())
            .spawn(move || reactor.run())?
    };

    log::info!("mmwave-io running. Type radar CLI commands, `exit` to stop.");

    // Operator loop: one command per line, forwarded to the radar's CLI
    // port with the newline it expects.
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::error!("Failed to read stdin: {}", e);
                break;
            }
        }

        let command = line.trim_end_matches(['\r', '\n']);
        if command == "exit" {
            break;
        }

        let mut bytes = command.as_bytes().to_vec();
        bytes.push(b'\n');
        control.async_write(&bytes);
    }

    log::info!("Shutting down...");
    reactor.quit();
    if reactor_thread.join().is_err() {
        log::error!("Reactor thread panicked");
    }

    control.shutdown();
    data.shutdown();

    if let Err(e) = writer.flush() {
        log::error!("Failed to flush frame records: {}", e);
    }
    logging::flush();

    Ok(())
}
