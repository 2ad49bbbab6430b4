//! Configuration & bootstrap (C8). Out of scope per spec.md §1, but
//! specified as the ambient stack (§6): CLI via `structopt`, sectioned
//! TOML via `toml`/`serde`, following the teacher's table-walking style
//! (`darkirc::settings::parse_configured_channels`) since section
//! presence — not just key presence — changes behavior here.

use std::collections::BTreeMap;

use serde::Deserialize;
use structopt::StructOpt;
use structopt_toml::StructOptToml;
use toml::Value;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "/usr/local/etc/axrelay.conf";

/// Top-level CLI, mirroring the Python `axrelay` tool's three
/// subcommands (spec.md §6).
#[derive(Debug, StructOpt)]
#[structopt(name = "axrelay")]
pub enum Command {
    /// Start the relay (requires config)
    Run(CommonOpts),
    /// Hash the given real address(es), or with -l, reverse-lookup alias(es)
    Hash(HashOpts),
    /// Print one fresh base64-encoded 32-byte secret to stdout
    Secret(CommonOpts),
}

#[derive(Debug, Clone, StructOpt, Deserialize, StructOptToml)]
#[serde(default)]
pub struct CommonOpts {
    /// Configuration file
    #[structopt(short, long, default_value = "/usr/local/etc/axrelay.conf")]
    pub config: String,

    /// Set logging to ERROR
    #[structopt(short, long)]
    pub quiet: bool,

    /// Set logging to DEBUG
    #[structopt(short, long)]
    pub debug: bool,

    /// Log to file
    #[structopt(long = "log-file")]
    pub log_file: Option<String>,
}

impl Default for CommonOpts {
    fn default() -> Self {
        Self { config: DEFAULT_CONFIG_FILE.to_string(), quiet: false, debug: false, log_file: None }
    }
}

#[derive(Debug, Clone, StructOpt)]
pub struct HashOpts {
    #[structopt(flatten)]
    pub common: CommonOpts,

    /// Store results
    #[structopt(short = "S", long = "store")]
    pub build_storage: bool,

    /// Lookup real jid for hashed jid
    #[structopt(short, long)]
    pub lookup: bool,

    /// Address(es) to hash, or alias(es) to look up with -l
    pub addresses: Vec<String>,
}

impl CommonOpts {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            log::LevelFilter::Error
        } else if self.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}

/// `[relay]` + `[hash]` + one of `[memcache]` | `[local_storage]`
/// (spec.md §6; the older `[main]` layout from the source is
/// explicitly rejected per spec.md §9's Open Question resolution).
pub struct Config {
    pub relay: RelaySettings,
    pub hash: HashSettings,
    pub memcache: Option<MemcacheSettings>,
    pub local_storage: Option<LocalStorageSettings>,
}

pub struct RelaySettings {
    pub server: String,
    pub port: u16,
    pub jid: String,
    pub password: String,
}

pub struct HashSettings {
    pub secret: String,
    pub domain: String,
}

#[derive(Clone, Default)]
pub struct LocalStorageSettings {
    pub encrypt: Option<String>,
}

const MEMCACHE_BOOL_BEHAVIORS: &[&str] = &[
    "ketama",
    "ketama_weighted",
    "buffer_requests",
    "cache_lookups",
    "no_block",
    "tcp_nodelay",
    "cas",
    "verify_keys",
];
const MEMCACHE_STRING_BEHAVIORS: &[&str] = &["hash", "distribution", "ketama_hash"];
const MEMCACHE_INT_BEHAVIORS: &[&str] =
    &["connect_timeout", "receive_timeout", "send_timeout", "num_replicas", "remove_failed"];

#[derive(Clone, Default)]
pub struct MemcacheSettings {
    pub servers: Vec<String>,
    pub binary: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub string_behaviors: BTreeMap<String, String>,
    pub bool_behaviors: BTreeMap<String, bool>,
    pub int_behaviors: BTreeMap<String, i64>,
    pub encrypt: Option<String>,
}

impl MemcacheSettings {
    /// One connection URL per configured server, folding the behaviors
    /// into query parameters the way the `memcache` crate expects.
    pub fn connection_urls(&self) -> Vec<String> {
        let mut params = Vec::new();
        if self.binary {
            params.push("protocol=binary".to_string());
        }
        if let (Some(u), Some(p)) = (&self.username, &self.password) {
            params.push(format!("username={u}"));
            params.push(format!("password={p}"));
        }
        for (k, v) in &self.string_behaviors {
            params.push(format!("{k}={v}"));
        }
        for (k, v) in &self.bool_behaviors {
            params.push(format!("{k}={v}"));
        }
        for (k, v) in &self.int_behaviors {
            params.push(format!("{k}={v}"));
        }
        let query = if params.is_empty() { String::new() } else { format!("?{}", params.join("&")) };

        self.servers.iter().map(|s| format!("memcache://{s}{query}")).collect()
    }
}

/// Parse the sectioned config file content. `require_relay_hash`
/// controls whether `[relay]`/`[hash]` must be present — the `hash`
/// and `secret` subcommands don't need them unless storage is
/// requested (spec.md §9: plain `hash` is derivation-only).
pub fn parse_config(data: &str, config_file: &str) -> Result<Config> {
    let table = match data.parse::<Value>().map_err(Error::Toml)? {
        Value::Table(t) => t,
        _ => Default::default(),
    };

    let relay = parse_relay_section(&table, config_file)?;
    let hash = parse_hash_section(&table, config_file)?;
    let memcache = parse_memcache_section(&table, config_file)?;
    let local_storage = parse_local_storage_section(&table);

    Ok(Config { relay, hash, memcache, local_storage })
}

fn section<'a>(table: &'a toml::map::Map<String, Value>, name: &'static str) -> Option<&'a toml::map::Map<String, Value>> {
    table.get(name).and_then(Value::as_table)
}

fn required_str(
    tbl: &toml::map::Map<String, Value>,
    key: &'static str,
    section_name: &'static str,
    config_file: &str,
) -> Result<String> {
    tbl.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::MissingOption(key, section_name, config_file.to_string()))
}

fn parse_relay_section(table: &toml::map::Map<String, Value>, config_file: &str) -> Result<RelaySettings> {
    let tbl = section(table, "relay").ok_or_else(|| Error::MissingSection(config_file.to_string(), "relay"))?;

    let server = required_str(tbl, "server", "relay", config_file)?;
    let jid = required_str(tbl, "jid", "relay", config_file)?;
    let password = required_str(tbl, "password", "relay", config_file)?;

    let port_value = tbl
        .get("port")
        .ok_or_else(|| Error::MissingOption("port", "relay", config_file.to_string()))?;
    let port: u16 = match port_value {
        Value::Integer(i) => {
            u16::try_from(*i).map_err(|_| Error::NotAnInteger("port", "relay", config_file.to_string()))?
        }
        Value::String(s) => s.parse().map_err(|_| Error::NotAnInteger("port", "relay", config_file.to_string()))?,
        _ => return Err(Error::NotAnInteger("port", "relay", config_file.to_string())),
    };

    Ok(RelaySettings { server, port, jid, password })
}

fn parse_hash_section(table: &toml::map::Map<String, Value>, config_file: &str) -> Result<HashSettings> {
    let tbl = section(table, "hash").ok_or_else(|| Error::MissingSection(config_file.to_string(), "hash"))?;

    let secret = required_str(tbl, "secret", "hash", config_file)?;
    let domain = required_str(tbl, "domain", "hash", config_file)?;

    Ok(HashSettings { secret, domain })
}

fn parse_memcache_section(
    table: &toml::map::Map<String, Value>,
    config_file: &str,
) -> Result<Option<MemcacheSettings>> {
    let Some(tbl) = section(table, "memcache") else { return Ok(None) };

    let servers_raw = required_str(tbl, "servers", "memcache", config_file)?;
    let servers = servers_raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();

    let binary = tbl.get("binary").and_then(Value::as_bool).unwrap_or(false);
    let username = tbl.get("username").and_then(Value::as_str).map(str::to_string);
    let password = tbl.get("password").and_then(Value::as_str).map(str::to_string);
    let encrypt = tbl.get("encrypt").and_then(Value::as_str).map(str::to_string);

    let mut string_behaviors = BTreeMap::new();
    let mut bool_behaviors = BTreeMap::new();
    let mut int_behaviors = BTreeMap::new();

    let known: Vec<&str> = ["servers", "binary", "username", "password", "encrypt"]
        .iter()
        .chain(MEMCACHE_STRING_BEHAVIORS)
        .chain(MEMCACHE_BOOL_BEHAVIORS)
        .chain(MEMCACHE_INT_BEHAVIORS)
        .copied()
        .collect();

    for key in tbl.keys() {
        if !known.contains(&key.as_str()) {
            return Err(Error::UnknownOption(key.clone(), "memcache", config_file.to_string()));
        }
    }

    for key in MEMCACHE_STRING_BEHAVIORS {
        if let Some(v) = tbl.get(*key).and_then(Value::as_str) {
            string_behaviors.insert((*key).to_string(), v.to_string());
        }
    }
    for key in MEMCACHE_BOOL_BEHAVIORS {
        if let Some(v) = tbl.get(*key).and_then(Value::as_bool) {
            bool_behaviors.insert((*key).to_string(), v);
        }
    }
    for key in MEMCACHE_INT_BEHAVIORS {
        if let Some(v) = tbl.get(*key).and_then(Value::as_integer) {
            int_behaviors.insert((*key).to_string(), v);
        }
    }

    Ok(Some(MemcacheSettings {
        servers,
        binary,
        username,
        password,
        string_behaviors,
        bool_behaviors,
        int_behaviors,
        encrypt,
    }))
}

fn parse_local_storage_section(table: &toml::map::Map<String, Value>) -> Option<LocalStorageSettings> {
    section(table, "local_storage")
        .map(|tbl| LocalStorageSettings { encrypt: tbl.get("encrypt").and_then(Value::as_str).map(str::to_string) })
}
