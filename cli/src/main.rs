mod state;

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use noteline_core::chunker;
use noteline_core::envelope::{self, Envelope, EnvelopeKind};
use noteline_storage_traits::contacts::ContactStorage;
use noteline_storage_traits::contacts::types::Contact;
use noteline_storage_traits::events::{EventStorage, Pagination};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "noteline")]
#[command(about = "Operator CLI for on-ledger messaging state and envelopes")]
struct Cli {
    /// State directory (database, identity and config live here)
    #[arg(long, default_value = ".noteline", env = "NOTELINE_STATE_DIR")]
    state_dir: PathBuf,

    /// Config file (defaults to <state-dir>/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show (or create) the local identity
    Identity {
        /// Ledger address to bind a new identity to
        #[arg(long)]
        address: Option<String>,
    },

    /// Manage PSK contacts
    #[command(subcommand)]
    Contact(ContactCommand),

    /// List message events, newest first
    Events {
        /// Only events for this participant
        #[arg(long)]
        participant: Option<String>,

        /// Max events to return
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Events to skip (with --participant)
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Seal a message into a hex-encoded envelope
    Seal {
        #[command(flatten)]
        key: KeyArgs,

        /// Ratchet counter (PSK) or part index (direct)
        #[arg(long, default_value_t = 0)]
        counter: u64,

        /// Message text
        #[arg(long)]
        text: String,
    },

    /// Open a hex-encoded envelope
    Open {
        #[command(flatten)]
        key: KeyArgs,

        /// Envelope bytes as hex
        #[arg(long)]
        note: String,
    },

    /// Show how a message would be chunked
    Split {
        /// Byte limit per chunk (defaults to the PSK chunk limit)
        #[arg(long)]
        max_bytes: Option<usize>,

        /// Message text
        #[arg(long)]
        text: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Debug, Subcommand)]
enum ContactCommand {
    /// Add an unmatched contact
    Add {
        /// Display name
        #[arg(long)]
        nickname: String,

        #[command(flatten)]
        secret: SecretArgs,
    },

    /// List all contacts
    List,

    /// Mark a contact inactive
    Deactivate {
        /// Contact id
        #[arg(long)]
        id: String,
    },
}

#[derive(Debug, Args)]
struct SecretArgs {
    /// Pre-shared secret
    #[arg(long)]
    secret: String,

    /// Interpret --secret as hex
    #[arg(long)]
    hex: bool,
}

impl SecretArgs {
    fn bytes(&self) -> anyhow::Result<Vec<u8>> {
        parse_secret(&self.secret, self.hex)
    }
}

#[derive(Debug, Args)]
struct KeyArgs {
    /// Pre-shared secret (PSK envelope)
    #[arg(long, conflicts_with = "public_key")]
    secret: Option<String>,

    /// Interpret --secret as hex
    #[arg(long, requires = "secret")]
    hex: bool,

    /// Sending ledger address, bound into PSK envelopes
    #[arg(long, requires = "secret")]
    sender: Option<String>,

    /// Recipient public key as hex (direct envelope; open uses the local identity)
    #[arg(long)]
    public_key: Option<String>,
}

impl KeyArgs {
    fn psk_sender(&self) -> anyhow::Result<&str> {
        self.sender
            .as_deref()
            .ok_or_else(|| anyhow!("PSK envelopes need --sender"))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.state_dir)
        .with_context(|| format!("create state dir {}", cli.state_dir.display()))?;

    match &cli.cmd {
        Command::Identity { address } => cmd_identity(&cli, address.as_deref()),
        Command::Contact(ContactCommand::Add { nickname, secret }) => {
            cmd_contact_add(&cli, nickname, secret)
        }
        Command::Contact(ContactCommand::List) => cmd_contact_list(&cli),
        Command::Contact(ContactCommand::Deactivate { id }) => cmd_contact_deactivate(&cli, id),
        Command::Events {
            participant,
            limit,
            offset,
        } => cmd_events(&cli, participant.as_deref(), *limit, *offset),
        Command::Seal { key, counter, text } => cmd_seal(&cli, key, *counter, text),
        Command::Open { key, note } => cmd_open(&cli, key, note),
        Command::Split { max_bytes, text } => cmd_split(&cli, *max_bytes, text),
        Command::Config => cmd_config(&cli),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn print(v: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&v).context("json encode")?);
    Ok(())
}

fn parse_secret(secret: &str, is_hex: bool) -> anyhow::Result<Vec<u8>> {
    let bytes = if is_hex {
        hex::decode(secret.trim()).context("decode secret hex")?
    } else {
        secret.as_bytes().to_vec()
    };
    if bytes.is_empty() {
        return Err(anyhow!("secret must not be empty"));
    }
    Ok(bytes)
}

fn contact_json(contact: &Contact) -> serde_json::Value {
    json!({
        "id": contact.id,
        "nickname": contact.nickname,
        "mobile_address": contact.mobile_address,
        "matched": contact.is_matched(),
        "active": contact.active,
        "network": contact.network,
        "outbound_counter": contact.outbound_counter,
        "created_at": contact.created_at,
    })
}

// ── Commands ────────────────────────────────────────────────────────────────

fn cmd_identity(cli: &Cli, address: Option<&str>) -> anyhow::Result<()> {
    let identity = state::load_or_create_identity(&cli.state_dir, address)?;
    print(json!({
        "address": identity.address(),
        "public_key": hex::encode(identity.public_key()),
    }))
}

fn cmd_contact_add(cli: &Cli, nickname: &str, secret: &SecretArgs) -> anyhow::Result<()> {
    let config = state::load_config(&cli.state_dir, cli.config.as_deref())?;
    let storage = state::open_storage(&cli.state_dir)?;
    let id = hex::encode(rand::random::<[u8; 16]>());
    let contact = Contact::new(id, nickname, &secret.bytes()?, config.network.as_str());
    storage.save_contact(contact.clone()).context("save contact")?;
    print(contact_json(&contact))
}

fn cmd_contact_list(cli: &Cli) -> anyhow::Result<()> {
    let storage = state::open_storage(&cli.state_dir)?;
    let contacts = storage.all_contacts().context("list contacts")?;
    print(json!({
        "contacts": contacts.iter().map(contact_json).collect::<Vec<_>>(),
    }))
}

fn cmd_contact_deactivate(cli: &Cli, id: &str) -> anyhow::Result<()> {
    let storage = state::open_storage(&cli.state_dir)?;
    storage
        .deactivate_contact(id)
        .with_context(|| format!("deactivate contact {id}"))?;
    print(json!({ "id": id, "active": false }))
}

fn cmd_events(
    cli: &Cli,
    participant: Option<&str>,
    limit: usize,
    offset: usize,
) -> anyhow::Result<()> {
    let storage = state::open_storage(&cli.state_dir)?;
    let events = match participant {
        Some(participant) => storage
            .events_for_participant(participant, Pagination::new(Some(limit), Some(offset)))
            .context("load participant events")?,
        None => storage.recent_events(limit).context("load recent events")?,
    };
    print(json!({ "events": events }))
}

fn cmd_seal(cli: &Cli, key: &KeyArgs, counter: u64, text: &str) -> anyhow::Result<()> {
    let sealed = match (&key.secret, &key.public_key) {
        (Some(secret), None) => envelope::seal_psk(
            &parse_secret(secret, key.hex)?,
            key.psk_sender()?,
            counter,
            text.as_bytes(),
        )?,
        (None, Some(public_key)) => {
            envelope::seal_direct(&state::decode_key(public_key)?, counter, text.as_bytes())?
        }
        _ => return Err(anyhow!("pass exactly one of --secret or --public-key")),
    };

    let config = state::load_config(&cli.state_dir, cli.config.as_deref())?;
    if text.len() > config.psk_chunk_bytes {
        tracing::warn!(
            len = text.len(),
            limit = config.psk_chunk_bytes,
            "Message is larger than one chunk; senders split it first"
        );
    }
    let note = sealed.encode();
    print(json!({
        "kind": sealed.kind.to_string(),
        "counter": sealed.counter,
        "len": note.len(),
        "overhead": envelope_overhead(counter),
        "note": hex::encode(note),
    }))
}

fn cmd_open(cli: &Cli, key: &KeyArgs, note: &str) -> anyhow::Result<()> {
    let bytes = hex::decode(note.trim()).context("decode note hex")?;
    let sealed = Envelope::decode(&bytes).context("decode envelope")?;

    let plaintext = match (sealed.kind, &key.secret) {
        (EnvelopeKind::Psk, Some(secret)) => {
            envelope::open_psk(&parse_secret(secret, key.hex)?, key.psk_sender()?, &sealed)?
        }
        (EnvelopeKind::Psk, None) => return Err(anyhow!("PSK envelope needs --secret")),
        (EnvelopeKind::Direct, _) => {
            let identity = state::load_or_create_identity(&cli.state_dir, None)?;
            identity.open(&sealed)?
        }
    };

    print(json!({
        "kind": sealed.kind.to_string(),
        "counter": sealed.counter,
        "text": String::from_utf8_lossy(&plaintext),
    }))
}

fn cmd_split(cli: &Cli, max_bytes: Option<usize>, text: &str) -> anyhow::Result<()> {
    let max_bytes = match max_bytes {
        Some(max_bytes) => max_bytes,
        None => state::load_config(&cli.state_dir, cli.config.as_deref())?.psk_chunk_bytes,
    };
    let segments = chunker::split(text, max_bytes)?;
    print(json!({
        "max_bytes": max_bytes,
        "segments": segments
            .iter()
            .map(|segment| json!({ "len": segment.len(), "text": segment }))
            .collect::<Vec<_>>(),
    }))
}

fn cmd_config(cli: &Cli) -> anyhow::Result<()> {
    let config = state::load_config(&cli.state_dir, cli.config.as_deref())?;
    print(serde_json::to_value(&config).context("encode config")?)
}

/// Envelope bytes around the ciphertext
fn envelope_overhead(counter: u64) -> usize {
    1 + envelope::varint_len(counter)
        + noteline_core::constant::EPHEMERAL_KEY_LEN
        + noteline_core::constant::TAG_LEN
}
