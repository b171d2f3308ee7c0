//! CLI entry point for the proxy: binds a listener, pairs every accepted
//! connection with a connection to the real server, and logs the decoded
//! traffic while forwarding every byte unchanged. See `mcrelay-net` for the
//! reactor and `mcrelay-log` for the line-rendering adapters.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use mcrelay_log::{ClientLogFlags, ClientLogger, MapCapture, ServerLogFlags, ServerLogger};
use mcrelay_net::Reactor;
use mcrelay_protocol::Parser as PacketParser;
use time::OffsetDateTime;

/// Logging proxy for the Minecraft 1.2 (protocol 29) client-server
/// connection. Every byte is forwarded verbatim to the real server; decoded
/// chat, position, health, and time events are written to a per-session log
/// file, and map-chunk payloads can optionally be captured into `maplog`
/// files for later merging with `relay-regionmerge`.
#[derive(Parser)]
#[command(name = "relay-proxy")]
struct Args {
    /// Listen port.
    #[arg(short = 'p', long, default_value_t = 25565)]
    port: u16,

    /// Bind address.
    #[arg(short = 'b', long, default_value = "127.0.0.1")]
    bind: String,

    /// `host:port` of the real server. Required unless `--test-file` is set.
    destination: Option<String>,

    /// `strftime`-style template for the per-session log file path.
    #[arg(short = 'o', long, default_value = "mclog-%Y%m%d.txt")]
    output: String,

    /// Disable safe mode: a protocol error becomes fatal to the session
    /// instead of disabling that direction's parser.
    #[arg(short = 'U', long = "unsafe")]
    unsafe_mode: bool,

    /// Directory to write `r.<rx>.<rz>.maplog` capture files into.
    #[arg(short = 'M', long = "maplog-dir")]
    maplog_dir: Option<PathBuf>,

    /// Only capture map chunks while the server has reported this dimension.
    #[arg(short = 'D', long = "maplog-dimension")]
    maplog_dimension: Option<i32>,

    /// Artificial per-chunk observer delay, in milliseconds.
    #[arg(short = 'L', long, default_value_t = 0)]
    delay: u64,

    /// Enable verbose parser/byte-level diagnostics.
    #[arg(short, long)]
    debug: bool,

    /// Replay a captured byte file through a `ServerLogger` to stdout
    /// instead of listening.
    #[arg(short = 't', long = "test-file")]
    test_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if err.kind() == clap::error::ErrorKind::DisplayHelp
            || err.kind() == clap::error::ErrorKind::DisplayVersion =>
        {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(100);
        }
    };

    let filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::new(filter)).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    if let Some(test_file) = &args.test_file {
        return replay_test_file(test_file);
    }

    let Some(destination) = &args.destination else {
        bail!("missing required argument: destination (host:port)");
    };

    let bind_addr: SocketAddr =
        format!("{}:{}", args.bind, args.port).parse().context("invalid bind address")?;
    let destination_addr = destination
        .to_socket_addrs()
        .with_context(|| format!("could not resolve destination {destination}"))?
        .next()
        .with_context(|| format!("destination {destination} resolved to no addresses"))?;

    let safe_mode = !args.unsafe_mode;
    let delay = (args.delay > 0).then(|| Duration::from_millis(args.delay));
    let output_template = args.output.clone();
    let capture = args.maplog_dir.as_ref().map(|dir| MapCapture {
        dir: dir.clone(),
        dimension: args.maplog_dimension.unwrap_or(0),
    });

    let observer_factory = move || {
        let path = render_output_template(&output_template, OffsetDateTime::now_utc());
        let client_logger = ClientLogger::to_path(&path, ClientLogFlags::default())
            .unwrap_or_else(|err| panic!("failed to open session log {path}: {err}"));
        let server_logger =
            ServerLogger::to_path(&path, ServerLogFlags::default(), capture.clone())
                .unwrap_or_else(|err| panic!("failed to open session log {path}: {err}"));
        (client_logger, server_logger)
    };

    let mut reactor = Reactor::bind(bind_addr, destination_addr, safe_mode, delay, observer_factory)
        .context("failed to bind listener")?;
    tracing::info!("listening on {bind_addr}, forwarding to {destination_addr}");

    loop {
        reactor.turn().context("reactor error")?;
    }
}

/// Feeds `path`'s bytes through a `ServerLogger` writing to stdout, as a
/// one-shot offline decode of a previously captured stream.
fn replay_test_file(path: &std::path::Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let logger = ServerLogger::new(
        Box::new(std::io::stdout()),
        Box::new(mcrelay_log::SystemClock),
        ServerLogFlags::default(),
        None,
    );
    let mut parser = PacketParser::new(true, logger);
    parser.feed(&bytes).context("parser error while replaying test file")?;
    Ok(())
}

/// Expands a small `strftime` subset (`%Y %y %m %d %H %M %S %%`) against
/// `now`; every other character is copied through unchanged. This is the
/// one-to-one counterpart of the original tool's `time.strftime(self.output)`
/// call.
fn render_output_template(template: &str, now: OffsetDateTime) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(&format!("{:04}", now.year())),
            Some('y') => out.push_str(&format!("{:02}", now.year().rem_euclid(100))),
            Some('m') => out.push_str(&format!("{:02}", u8::from(now.month()))),
            Some('d') => out.push_str(&format!("{:02}", now.day())),
            Some('H') => out.push_str(&format!("{:02}", now.hour())),
            Some('M') => out.push_str(&format!("{:02}", now.minute())),
            Some('S') => out.push_str(&format!("{:02}", now.second())),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::render_output_template;

    #[test]
    fn expands_known_specifiers() {
        let now = datetime!(2023-03-07 14:05:09 UTC);
        assert_eq!(render_output_template("mclog-%Y%m%d.txt", now), "mclog-20230307.txt");
        assert_eq!(render_output_template("%H:%M:%S", now), "14:05:09");
    }

    #[test]
    fn passes_through_unknown_specifiers_and_literal_percent() {
        let now = datetime!(2023-03-07 14:05:09 UTC);
        assert_eq!(render_output_template("100%% done %q", now), "100% done %q");
    }
}
