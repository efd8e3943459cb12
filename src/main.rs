// This is my main entry point for the gossip node CLI
use clap::Parser;
use log::{error, info, LevelFilter};
use penguin_node::cli::node_settings;
use penguin_node::network::open_store;
use penguin_node::{canonicalize, Command, Object, ObjectId, Opt, Server, Wallet};
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    // Info level shows connections and stored objects; RUST_LOG can still override it
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    // If something goes wrong, I log the error and exit with code 1
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        // Running a node: settings from file, environment, then flags
        Command::StartNode {
            config,
            listen,
            peers,
            db,
        } => {
            let settings = node_settings(config.as_deref(), listen, peers, db)?;
            let store = open_store(&settings)?;
            let server = Server::bind(&settings, store)?;
            info!("Listening on {}", server.local_addr()?);
            server.run()?;
        }
        // A fresh Ed25519 key; the public key is what goes into outputs
        Command::Keygen { out } => {
            let wallet = Wallet::new()?;
            wallet.save(&out)?;
            println!("Public key: {}", wallet.public_key_hex());
            println!("Key file written to {}", out.display());
        }
        Command::ObjectId { file } => {
            let object = read_json(&file)?;
            println!("{}", ObjectId::of(&object)?);
        }
        // Signing happens offline; the output can be pasted into an object message
        Command::SignTx { key, file } => {
            let wallet = Wallet::load(&key)?;
            let mut tx = match Object::from_value(&read_json(&file)?)? {
                Object::Transaction(tx) => tx,
                other => return Err(format!("Expected a transaction, got a {}", other.kind()).into()),
            };
            if tx.is_coinbase() {
                return Err("Coinbase transactions have no inputs to sign".into());
            }
            wallet.sign_transaction(&mut tx)?;
            let signed = canonicalize(&Object::Transaction(tx))?;
            println!("{}", String::from_utf8(signed)?);
        }
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&raw)?)
}
