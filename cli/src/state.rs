//! State directory: SQLite database, local identity and config file

use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use noteline_core::config::{self, NotelineConfig};
use noteline_core::identity::Identity;
use noteline_sqlite_storage::NotelineSqliteStorage;
use serde::{Deserialize, Serialize};

const DATABASE_FILE: &str = "noteline.db";
const IDENTITY_FILE: &str = "identity.json";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    address: String,
    secret_hex: String,
}

pub fn open_storage(state_dir: &Path) -> anyhow::Result<NotelineSqliteStorage> {
    let path = state_dir.join(DATABASE_FILE);
    NotelineSqliteStorage::new(&path).with_context(|| format!("open database {}", path.display()))
}

/// Config from `--config`, else the state dir's `config.json`, then env overrides
pub fn load_config(state_dir: &Path, explicit: Option<&Path>) -> anyhow::Result<NotelineConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| state_dir.join(CONFIG_FILE));
    let mut config =
        config::load_config(&path).with_context(|| format!("load config {}", path.display()))?;
    config.apply_env_overrides().context("apply env overrides")?;
    config.validate().context("validate config")?;
    Ok(config)
}

/// Load the identity, creating it for `address` if none exists yet
pub fn load_or_create_identity(state_dir: &Path, address: Option<&str>) -> anyhow::Result<Identity> {
    let path = state_dir.join(IDENTITY_FILE);
    if path.exists() {
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let file: IdentityFile = serde_json::from_str(&raw).context("parse identity file")?;
        if let Some(address) = address
            && address != file.address
        {
            return Err(anyhow!(
                "state dir already holds identity for {}, not {address}",
                file.address
            ));
        }
        let secret = decode_key(&file.secret_hex).context("decode identity secret")?;
        return Ok(Identity::from_bytes(file.address, secret));
    }

    let address = address.ok_or_else(|| anyhow!("no identity yet; pass --address to create one"))?;
    let secret: [u8; 32] = rand::random();
    let file = IdentityFile {
        address: address.to_string(),
        secret_hex: hex::encode(secret),
    };
    fs::write(&path, serde_json::to_string_pretty(&file)?)
        .with_context(|| format!("write {}", path.display()))?;
    restrict_permissions(&path)?;
    tracing::info!(address = %address, "Created identity");
    Ok(Identity::from_bytes(file.address, secret))
}

/// Decode a 32-byte key from hex
pub fn decode_key(value: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(value.trim()).context("decode hex")?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow!("expected 32 bytes, got {}", bytes.len()))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
