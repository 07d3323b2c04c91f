//! mesh-sig binary.
//!
//! Signs and verifies RFC5444 packets and messages with the configured
//! RFC7182 signature policies and shows the configured layer2 data.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mesh_layer2::{ConfiguredLayer2, Layer2Data, Layer2Db, Layer2Net, Metadata};
use mesh_signature::{SignatureRegistry, SignatureScratch, Verdict};
use mesh_wire::TlvBlockContext;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::MeshSigConfig;
use logging::ServiceLogFormatter;

/// RFC7182 signatures and layer2 data for mesh
#[derive(Parser, Debug)]
#[command(name = "mesh-sig", version, about = "RFC7182 signatures and layer2 data for mesh")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "mesh-sig.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign with every active policy and print the signed hex
    Sign(ContentArgs),
    /// Verify and print `accept` or the drop reason
    Verify(ContentArgs),
    /// Apply the configured layer2 data and print it
    Layer2 {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct ContentArgs {
    /// Message or packet, hex encoded
    #[arg(long)]
    hex: String,

    /// Input is a packet instead of a single message
    #[arg(long)]
    packet: bool,

    /// Local address when signing, sender address when verifying
    #[arg(long)]
    source: Option<IpAddr>,
}

impl ContentArgs {
    fn bytes(&self) -> anyhow::Result<Vec<u8>> {
        hex::decode(self.hex.trim()).context("input is not valid hex")
    }

    fn context<'a>(&self, buf: &'a [u8]) -> anyhow::Result<TlvBlockContext<'a>> {
        let ctx = if self.packet {
            TlvBlockContext::packet(buf)
        } else {
            TlvBlockContext::message(buf)
        };
        ctx.context("malformed input")
    }
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(format!("mesh_sig={}", level).parse()?)
        .add_directive(format!("mesh_signature={}", level).parse()?)
        .add_directive(format!("mesh_layer2={}", level).parse()?)
        .add_directive(format!("mesh_wire={}", level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(ServiceLogFormatter::new("mesh-sig"))
        .init();
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logging comes up before the config file is read, so the log level
    // from the environment is looked at directly here.
    let level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var(config::ENV_LOG_LEVEL).ok())
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level)?;

    info!("Starting mesh-sig v{}", env!("CARGO_PKG_VERSION"));
    let config = MeshSigConfig::load_from_file(&cli.config)?;

    match &cli.command {
        Command::Sign(args) => sign(&config, args),
        Command::Verify(args) => verify(&config, args),
        Command::Layer2 { json } => layer2(&config, *json),
    }
}

fn sign(config: &MeshSigConfig, args: &ContentArgs) -> anyhow::Result<ExitCode> {
    let registry = config.build_registry()?;
    let input = args.bytes()?;
    let kind = args.context(&input)?.kind();

    if input.len() > config.max_packet_size {
        bail!(
            "input of {} bytes exceeds the maximum packet size {}",
            input.len(),
            config.max_packet_size
        );
    }

    let mut buf = vec![0u8; config.max_packet_size];
    buf[..input.len()].copy_from_slice(&input);

    let mut scratch = SignatureScratch::new(config.max_packet_size);
    let len = registry
        .sign(&args.source, kind, &mut buf, input.len(), &mut scratch)
        .context("signing failed")?;

    info!(component = "sign", "Signed {:?}: {} -> {} bytes", kind, input.len(), len);
    println!("{}", hex::encode(&buf[..len]));
    Ok(ExitCode::SUCCESS)
}

fn verify(config: &MeshSigConfig, args: &ContentArgs) -> anyhow::Result<ExitCode> {
    let registry = config.build_registry()?;
    let input = args.bytes()?;
    let ctx = args.context(&input)?;
    let mut scratch = SignatureScratch::new(config.max_packet_size);

    let label = if args.packet { "packet" } else { "message" };
    let verdict = registry.verify(&ctx, args.source, &mut scratch);
    if !report(label, verdict) {
        return Ok(ExitCode::FAILURE);
    }

    let mut accepted = true;
    for (index, message) in ctx.messages().enumerate() {
        let message = message.context("malformed message in packet")?;
        let label = format!("message {}", index);
        accepted &= verify_message(&registry, message, args.source, &mut scratch, &label)?;
    }

    Ok(if accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn verify_message(
    registry: &SignatureRegistry,
    message: &[u8],
    source: Option<IpAddr>,
    scratch: &mut SignatureScratch,
    label: &str,
) -> anyhow::Result<bool> {
    let ctx = TlvBlockContext::message(message).with_context(|| format!("malformed {}", label))?;
    Ok(report(label, registry.verify(&ctx, source, scratch)))
}

fn report(label: &str, verdict: Verdict) -> bool {
    match verdict {
        Verdict::Accept => {
            debug!(component = "verify", "{} accepted", label);
            println!("{}: accept", label);
            true
        }
        Verdict::Drop { scope, reason } => {
            info!(component = "verify", "{} dropped: {}", label, reason);
            println!("{}: drop {:?}, {}", label, scope, reason);
            false
        }
    }
}

fn layer2(config: &MeshSigConfig, as_json: bool) -> anyhow::Result<ExitCode> {
    let mut db = Layer2Db::new();
    let mut configured = ConfiguredLayer2::new(&mut db)?;

    for interface in &config.layer2 {
        configured
            .set_interface(&mut db, interface)
            .with_context(|| format!("invalid layer2 configuration of {}", interface.name))?;
    }
    info!(
        component = "layer2",
        "Applied layer2 configuration of {} interfaces",
        config.layer2.len()
    );

    if as_json {
        let networks: Vec<Value> = db.networks().map(network_json).collect();
        println!("{}", serde_json::to_string_pretty(&networks)?);
    } else {
        for net in db.networks() {
            print_network(net);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn formatted(data: &Layer2Data, meta: &Metadata) -> Option<String> {
    data.value().map(|value| value.format(meta, false))
}

fn print_network(net: &Layer2Net) {
    println!("{} ({})", net.name(), net.network_type);
    for (metric, data) in net.values() {
        if let Some(text) = formatted(data, metric.metadata()) {
            println!("  {}: {}", metric.key(), text);
        }
    }
    for (metric, data) in net.neighbor_defaults() {
        if let Some(text) = formatted(data, metric.metadata()) {
            println!("  default {}: {}", metric.key(), text);
        }
    }
    for neigh in net.neighbors() {
        println!("  neighbor {}", neigh.addr());
        for (metric, data) in neigh.values() {
            if let Some(text) = formatted(data, metric.metadata()) {
                println!("    {}: {}", metric.key(), text);
            }
        }
    }
}

fn metrics_json<'a, M>(
    values: impl Iterator<Item = (M, &'a Layer2Data)>,
    meta: fn(M) -> (&'static str, &'static Metadata),
) -> Value {
    let mut map = Map::new();
    for (metric, data) in values {
        let (key, metadata) = meta(metric);
        if let Some(text) = formatted(data, metadata) {
            map.insert(key.to_string(), Value::String(text));
        }
    }
    Value::Object(map)
}

fn network_json(net: &Layer2Net) -> Value {
    let neighbors: Vec<Value> = net
        .neighbors()
        .map(|neigh| {
            json!({
                "addr": neigh.addr(),
                "metrics": metrics_json(neigh.values(), |m| (m.key(), m.metadata())),
                "remote_ips": neigh.remote_ips().keys().collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "name": net.name(),
        "type": net.network_type.as_str(),
        "if_index": net.if_index,
        "metrics": metrics_json(net.values(), |m| (m.key(), m.metadata())),
        "defaults": metrics_json(net.neighbor_defaults(), |m| (m.key(), m.metadata())),
        "peer_ips": net.peer_ips().keys().collect::<Vec<_>>(),
        "neighbors": neighbors,
    })
}
