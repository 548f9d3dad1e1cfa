use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use kadnode::{rpc::DEFAULT_PORT, Dht, Id};

use tracing::Level;

/// Number of nodes a `put` replicates to.
const REPLICATION: usize = 5;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Addresses of nodes to bootstrap from
    seeds: Vec<Ipv4Addr>,
    /// Local address to bind to
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    bind: Ipv4Addr,
    /// Port shared by every node of the network
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Seconds before an unanswered request fails
    #[arg(long, default_value_t = 10)]
    timeout: u64,
    /// Print debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_thread_names(true)
        .init();

    let dht = Dht::builder()
        .bind_address(cli.bind)
        .port(cli.port)
        .request_timeout(Duration::from_secs(cli.timeout))
        .build()
        .expect("Failed to bind the node");

    println!("Node {} initialized on {}", dht.id(), dht.local_addr());

    if !cli.seeds.is_empty() {
        dht.bootstrap(&cli.seeds);
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let Some(command) = prompt(&mut lines, "Option (put | get | getlocal | exit): ") else {
            break;
        };

        match command.as_str() {
            "put" => {
                let Some(value) = prompt(&mut lines, "Data to store: ") else {
                    break;
                };
                let digest = dht.store_data(value.into_bytes(), REPLICATION);
                println!("Hash: {digest}");
            }
            "get" | "getlocal" => {
                let Some(hash) = prompt(&mut lines, "Hash: ") else {
                    break;
                };

                let digest = match Id::from_str(&hash) {
                    Ok(digest) => digest,
                    Err(error) => {
                        println!("Invalid hash: {error}");
                        continue;
                    }
                };

                let value = if command == "get" {
                    dht.lookup_data(digest)
                } else {
                    dht.lookup_data_local(digest)
                };

                match value {
                    Some(value) => println!("Output: {}", String::from_utf8_lossy(&value)),
                    None => println!("Output: no data"),
                }
            }
            "exit" => break,
            "" => {}
            other => println!("Unknown option: {other}"),
        }
    }

    dht.shutdown();
}

/// Print `message` and read the next trimmed line, `None` on end of input.
fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, message: &str) -> Option<String> {
    print!("{message}");
    let _ = io::stdout().flush();

    lines
        .next()
        .and_then(|line| line.ok())
        .map(|line| line.trim().to_string())
}
