//! Entente -- a DAIDE client playing with a pluggable bot.
//!
//! Connects to a DAIDE server over TCP and runs the session to completion
//! with the sample HoldBot. Exit code 0 on clean termination, 1 when the
//! client could not start.

use clap::Parser;
use log::error;

use entente::bot::HoldBot;
use entente::client::Client;

/// Default DAIDE server port.
const DEFAULT_PORT: u16 = 16713;

#[derive(Parser)]
#[command(name = "entente", about = "A DAIDE protocol Diplomacy client")]
struct Args {
    /// Server host name.
    #[arg(short = 's', conflicts_with = "ip")]
    server: Option<String>,

    /// Server IP address.
    #[arg(short = 'i')]
    ip: Option<String>,

    /// Server port.
    #[arg(short = 'p', default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log filter (error, warn, info, debug, trace).
    #[arg(short = 'l', default_value = "info")]
    log_level: String,

    /// Reconnect as POW:passcode when the server rejects our name.
    #[arg(short = 'r')]
    reconnect: Option<String>,

    /// Accepted for compatibility; the sample bots write no debug dump.
    #[arg(short = 'd')]
    debug_dump: bool,
}

/// Splits `POW:passcode` into a power mnemonic and a passcode.
fn parse_reconnect(value: &str) -> Result<(String, i32), String> {
    let (power, passcode) = value
        .split_once(':')
        .ok_or_else(|| "-r should be followed by 'POW:passcode'".to_string())?;
    if power.len() != 3 {
        return Err("the power should be three characters".to_string());
    }
    let passcode: i32 = passcode
        .parse()
        .map_err(|_| "the passcode should be a number".to_string())?;
    Ok((power.to_ascii_uppercase(), passcode))
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();
    let _ = args.debug_dump;

    let host = args
        .server
        .or(args.ip)
        .unwrap_or_else(|| "localhost".to_string());

    let reconnect = match args.reconnect.as_deref().map(parse_reconnect) {
        Some(Ok(reconnect)) => Some(reconnect),
        Some(Err(message)) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
        None => None,
    };

    match Client::connect(&host, args.port, reconnect, HoldBot::new()) {
        Ok(mut client) => {
            client.run();
        }
        Err(err) => {
            error!("failed to connect to {}:{}: {}", host, args.port, err);
            eprintln!("could not connect to {}:{}: {}", host, args.port, err);
            std::process::exit(1);
        }
    }
}
