use std::process::ExitCode;

use log::{error, warn};
use simplelog::{ColorChoice, CombinedLogger, Config as LogConfig, TermLogger, TerminalMode, WriteLogger};
use structopt::StructOpt;

use axrelay::address::Address;
use axrelay::alias::AliasService;
use axrelay::crypto::{decode_secret, new_secret, secret_hash};
use axrelay::error::{Error, Result};
use axrelay::relay::RelayEngine;
use axrelay::settings::{self, Command, CommonOpts, Config, HashOpts};
use axrelay::storage::{DistributedStore, MemoryStore, NonEnumerableStore, Store};

fn init_logger(opts: &CommonOpts) -> Result<()> {
    let level = opts.log_level();
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> =
        vec![TermLogger::new(level, LogConfig::default(), TerminalMode::Mixed, ColorChoice::Auto)];

    if let Some(path) = &opts.log_file {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        loggers.push(WriteLogger::new(level, LogConfig::default(), file));
    }

    CombinedLogger::init(loggers).map_err(Error::Log)
}

fn read_config(path: &str) -> Result<Config> {
    let data = std::fs::read_to_string(path).map_err(|_| Error::ConfigNotFound(path.to_string()))?;
    settings::parse_config(&data, path)
}

/// Build the configured storage backend, falling back to an in-memory
/// store with a warning when neither section is present
/// (`jidstorage.build_storage` in the source this was distilled from).
fn build_store(config: &Config) -> Result<Box<dyn Store>> {
    if let Some(mc) = &config.memcache {
        let inner: Box<dyn Store> = Box::new(DistributedStore::connect(mc)?);
        return Ok(match &mc.encrypt {
            Some(secret) => Box::new(NonEnumerableStore::new(
                inner,
                decode_secret(secret).map_err(|e| Error::MalformedSecret(format!("[memcache] encrypt: {e}")))?,
            )),
            None => inner,
        });
    }

    if let Some(ls) = &config.local_storage {
        let inner: Box<dyn Store> = Box::new(MemoryStore::new());
        return Ok(match &ls.encrypt {
            Some(secret) => Box::new(NonEnumerableStore::new(
                inner,
                decode_secret(secret)
                    .map_err(|e| Error::MalformedSecret(format!("[local_storage] encrypt: {e}")))?,
            )),
            None => inner,
        });
    }

    warn!("no [memcache] or [local_storage] section configured, falling back to a process-local store");
    Ok(Box::new(MemoryStore::new()))
}

fn run(opts: CommonOpts) -> Result<()> {
    let config = read_config(&opts.config)?;
    let bot_jid = Address::parse(&config.relay.jid);
    let hash_secret = decode_secret(&config.hash.secret).map_err(|e| Error::MalformedSecret(e.to_string()))?;
    let store = build_store(&config)?;
    let alias_service = AliasService::new(hash_secret, config.hash.domain.clone(), store);
    let _engine = RelayEngine::new(bot_jid, alias_service, std::time::Duration::from_secs(30));

    // No XMPP component connection library is in scope here (spec.md
    // §1): wiring a live `Transport` is left to whatever embeds this
    // crate against a real connection. Running the bundled binary
    // standalone is therefore a configuration error, not a silent no-op.
    Err(Error::Connection(
        "no Transport implementation is compiled into this binary; embed axrelay::relay::RelayEngine \
         against a real XMPP component connection"
            .to_string(),
    ))
}

/// `hash` subcommand: three modes depending on `-S`/`-l`
/// (`jidhash.hash_main` in the source this was distilled from).
fn hash(opts: HashOpts) -> Result<()> {
    let config = read_config(&opts.common.config)?;
    let hash_secret = decode_secret(&config.hash.secret).map_err(|e| Error::MalformedSecret(e.to_string()))?;

    if opts.lookup {
        let store = build_store(&config)?;
        let alias_service = AliasService::new(hash_secret, config.hash.domain.clone(), store);
        smol::block_on(async {
            for input in &opts.addresses {
                let alias = Address::parse(input);
                match alias_service.real_of(&alias).await? {
                    Some(real) => println!("{input} => {}", real.full()),
                    None => println!("{input} => (unknown)"),
                }
            }
            Ok(())
        })
    } else if opts.build_storage {
        let store = build_store(&config)?;
        let alias_service = AliasService::new(hash_secret, config.hash.domain.clone(), store);
        smol::block_on(async {
            for input in &opts.addresses {
                let addr = Address::parse(input);
                let alias = alias_service.alias_of(&addr).await?;
                println!("{input} => {}", alias.bare());
            }
            Ok(())
        })
    } else {
        // No store is touched at all in this mode (spec.md §9's Open
        // Question resolution): plain derivation only.
        for input in &opts.addresses {
            println!("{input} => {}", secret_hash(input.as_bytes(), &hash_secret));
        }
        Ok(())
    }
}

fn secret() -> Result<()> {
    println!("{}", new_secret());
    Ok(())
}

fn main() -> ExitCode {
    let command = Command::from_args();

    let common = match &command {
        Command::Run(c) => c.clone(),
        Command::Hash(h) => h.common.clone(),
        Command::Secret(c) => c.clone(),
    };

    if let Err(e) = init_logger(&common) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let result = match command {
        Command::Run(opts) => run(opts),
        Command::Hash(opts) => hash(opts),
        Command::Secret(_) => secret(),
    };

    if let Err(e) = result {
        error!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
