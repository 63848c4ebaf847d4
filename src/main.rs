//! CLI entry point for `pktmsg`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use pktmsg::codec::subject::{self, SubjectParts};
use pktmsg::config::Config;
use pktmsg::model::message::ClassifiedMessage;
use pktmsg::parser::header::decode_raw_bytes;

#[derive(Parser)]
#[command(
    name = "pktmsg",
    version,
    about = "Decode packet-radio email messages and Outpost/PIFO forms"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a message file and print what it contains
    Decode {
        /// Raw message file, as retrieved from the BBS
        path: PathBuf,
        /// Print the full classification as JSON
        #[arg(long)]
        json: bool,
    },
    /// Split a subject line into its parts
    Subject {
        line: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = pktmsg::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Decode { path, json } => cmd_decode(&path, json, &config),
        Commands::Subject { line, json } => cmd_subject(&line, json, &config),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = pktmsg::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "pktmsg.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "pktmsg", &mut std::io::stdout());
    Ok(())
}

/// Classify a message file and print the result.
fn cmd_decode(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let bytes = std::fs::read(path).map_err(|e| pktmsg::error::PktMsgError::io(path, &e))?;
    let raw = decode_raw_bytes(&bytes);
    let msg = pktmsg::classify(&raw);
    tracing::info!(path = %path.display(), kind = msg.kind_name(), "Decoded message");

    if json {
        print_json(&msg, config)
    } else {
        print_message_table(&msg, config);
        Ok(())
    }
}

/// Decompose a subject line and print its parts.
fn cmd_subject(line: &str, json: bool, config: &Config) -> anyhow::Result<()> {
    let parts = subject::decode(line);
    if json {
        return print_json(&parts, config);
    }
    println!();
    print_subject_parts(&parts);
    println!();
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T, config: &Config) -> anyhow::Result<()> {
    let text = if config.output.pretty_json {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

/// Print a classified message in a human-readable layout.
fn print_message_table(msg: &ClassifiedMessage, config: &Config) {
    println!();
    println!("  {:<20} {}", "Kind:", msg.kind_name());

    let Some(base) = msg.base() else {
        if let ClassifiedMessage::Unparseable(u) = msg {
            println!("  {:<20} {}", "Error:", u.error);
        }
        println!();
        return;
    };

    let env = &base.envelope;
    println!("  {:<20} {}", "Return address:", env.return_address);
    if !env.from.is_empty() {
        println!("  {:<20} {}", "From:", env.from);
    }
    if !env.to.is_empty() {
        println!("  {:<20} {}", "To:", env.to.join(", "));
    }
    if let Some(date) = env.delivery_time {
        println!("  {:<20} {}", "Delivered:", date.to_rfc2822());
    }
    println!("  {:<20} {}", "Subject line:", env.subject_line);

    let flags = [
        (base.flags.urgent, "urgent"),
        (base.flags.request_delivery_receipt, "delivery-receipt"),
        (base.flags.request_read_receipt, "read-receipt"),
    ];
    let set: Vec<&str> = flags.iter().filter(|(on, _)| *on).map(|(_, n)| *n).collect();
    if !set.is_empty() {
        println!("  {:<20} {}", "Flags:", set.join(", "));
    }
    if !base.fully_plain_text {
        println!("  {:<20} no (body was transfer-encoded)", "Plain text:");
    }

    match msg {
        ClassifiedMessage::Bounce(b) => println!("  {:<20} {:?}", "Reason:", b.reason),
        ClassifiedMessage::DeliveryReceipt(r) => {
            println!("  {:<20} {}", "Local message ID:", r.local_message_id);
            println!("  {:<20} {}", "Delivered to:", r.delivered_to);
            println!("  {:<20} {}", "Delivered subject:", r.delivered_subject);
        }
        ClassifiedMessage::ReadReceipt(r) => {
            println!("  {:<20} {}", "Read subject:", r.read_subject);
        }
        ClassifiedMessage::KnownForm { form_kind, .. } => {
            println!("  {:<20} {}", "Form:", form_kind.name());
        }
        _ => {}
    }

    if let Some(m) = msg.plain_message() {
        if let Some(call) = &m.from_call_sign {
            println!("  {:<20} {}", "Call sign:", call);
        }
        if let Some(bbs) = &m.from_bbs {
            println!("  {:<20} {}", "BBS:", bbs);
        }
        print_subject_parts(&m.subject);
    }

    if let Some(form) = msg.form() {
        println!();
        println!("  {} ({}-{}):", form.html_ident, form.pifo_version, form.form_version);
        for (tag, value) in form.fields.iter() {
            println!("    {tag:>12}  {}", value.replace('\n', "\n                  "));
        }
    } else if config.output.show_body {
        println!();
        for line in base.body.lines() {
            println!("  {line}");
        }
    }
    println!();
}

fn print_subject_parts(parts: &SubjectParts) {
    if !parts.origin_msg_id.is_empty() {
        println!("  {:<20} {}", "Message ID:", parts.origin_msg_id);
    }
    if let Some(severity) = parts.severity() {
        let name = severity.name().unwrap_or("unknown");
        println!("  {:<20} {} ({name})", "Severity:", severity.code());
    }
    if let Some(handling) = parts.handling() {
        let name = handling.name().unwrap_or("unknown");
        println!("  {:<20} {} ({name})", "Handling:", handling.code());
    }
    if let Some(tag) = &parts.form_tag {
        println!("  {:<20} {}", "Form tag:", tag);
    }
    println!("  {:<20} {}", "Subject:", parts.subject);
}
