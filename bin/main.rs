use std::sync::Arc;

use clap::{App, Arg};

use lamcast::{Address, Config, DeliveryCallbacks, MulticastMessage, Process};

struct PrintingCallbacks;

impl DeliveryCallbacks for PrintingCallbacks {
    fn on_delivered(&self, message: &MulticastMessage) {
        println!(
            "delivered {} from peer {}: {}",
            message.message_id,
            message.sender_id,
            String::from_utf8_lossy(&message.content)
        );
    }

    fn on_failed(&self, message: &MulticastMessage) {
        println!(
            "failed to deliver {} to {:?}",
            message.message_id, message.recipients
        );
    }
}

/// Parses a `"0,1,2"` or `"0-2"` peer-ID list into an explicit set.
fn parse_processes(spec: &str) -> Vec<u32> {
    if let Some((low, high)) = spec.split_once('-') {
        if let (Ok(low), Ok(high)) = (low.trim().parse(), high.trim().parse()) {
            return (low..=high).collect();
        }
    }
    spec.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[tokio::main]
pub async fn main() {
    let matches = App::new("lamcast")
        .version("0.1.0")
        .author("Dusk Network B.V. All Rights Reserved.")
        .about("Reliable multicast with Lamport-clock ordered delivery.")
        .arg(
            Arg::with_name("process_id")
                .help("This process's peer ID")
                .required(true),
        )
        .arg(
            Arg::with_name("host")
                .long("host")
                .help("Address to listen on")
                .takes_value(true)
                .default_value("localhost"),
        )
        .arg(
            Arg::with_name("port")
                .long("port")
                .help("Port to listen on (default: 8000+process_id)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("processes")
                .long("processes")
                .help("Known peer IDs, as \"0,1,2\" or \"0-2\"")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .value_name("LOG")
                .possible_values(&["error", "warn", "info", "debug", "trace"])
                .default_value("info")
                .help("Output log level")
                .takes_value(true),
        )
        .get_matches();

    let process_id: u32 = matches
        .value_of("process_id")
        .unwrap()
        .parse()
        .expect("process_id must be a non-negative integer");

    let host = matches.value_of("host").unwrap().to_string();
    let port: u16 = match matches.value_of("port") {
        Some(p) => p.parse().expect("port must be a valid u16"),
        None => lamcast::config::DEFAULT_PORT_BASE + process_id as u16,
    };

    let known_peers = matches
        .value_of("processes")
        .map(parse_processes)
        .unwrap_or_default()
        .into_iter()
        .filter(|&id| id != process_id)
        .map(|id| (id, Address::default_for(id)))
        .collect();

    let log = match matches
        .value_of("log-level")
        .expect("Failed parsing log-level arg")
    {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => unreachable!(),
    };
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(log)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed on subscribe tracing");

    let callbacks: Arc<dyn DeliveryCallbacks> = Arc::new(PrintingCallbacks);
    let process = Process::start(process_id, &host, port, known_peers, callbacks, Config::default())
        .await
        .unwrap_or_else(|err| {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        });

    println!(
        "peer {} listening on {}:{} — Ctrl-C to stop",
        process_id, host, port
    );

    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl-C handler");
    process.stop().await;
}
