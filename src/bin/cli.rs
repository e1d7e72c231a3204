//! EmberDB CLI Client
//!
//! Reads requests from stdin, sends them to the server and prints responses.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::TcpStream;

use clap::Parser;
use emberdb::protocol::Response;
use tracing_subscriber::{fmt, EnvFilter};

/// EmberDB CLI
#[derive(Parser, Debug)]
#[command(name = "emberdb-cli")]
#[command(about = "Interactive client for an EmberDB server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3030")]
    server: String,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> emberdb::Result<()> {
    let stream = TcpStream::connect(&args.server)?;
    tracing::debug!("Connected to {}", args.server);

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "emberdb> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        if request.trim_end_matches(';').eq_ignore_ascii_case("exit") {
            return Ok(());
        }

        writeln!(writer, "{}", request)?;
        writer.flush()?;

        let response = Response::read_from(&mut reader)?;
        for row in &response.rows {
            writeln!(stdout, "{}", row)?;
        }
        let status = if response.is_ok() { "OK" } else { "ERR" };
        match &response.message {
            Some(message) => writeln!(stdout, "{} {}", status, message)?,
            None => writeln!(stdout, "{}", status)?,
        }
    }
}
