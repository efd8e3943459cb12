use crate::config::Settings;
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "penguin-node", version, about = "Gossip node for a toy UTXO cryptocurrency")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "start-node", about = "Start a gossip node")]
    StartNode {
        #[arg(long, help = "TOML settings file")]
        config: Option<PathBuf>,
        #[arg(long, help = "Listen address, e.g. 0.0.0.0:18018")]
        listen: Option<String>,
        #[arg(long = "peer", help = "Seed peer host:port (repeatable)")]
        peers: Vec<String>,
        #[arg(long, help = "Database directory")]
        db: Option<PathBuf>,
    },
    #[command(name = "keygen", about = "Generate an Ed25519 key file")]
    Keygen {
        #[arg(long, help = "Where to write the key file")]
        out: PathBuf,
    },
    #[command(name = "object-id", about = "Print the id of a JSON object")]
    ObjectId {
        #[arg(help = "File holding the object")]
        file: PathBuf,
    },
    #[command(name = "sign-tx", about = "Sign every input of a transaction")]
    SignTx {
        #[arg(long, help = "Key file created by keygen")]
        key: PathBuf,
        #[arg(help = "File holding the unsigned transaction")]
        file: PathBuf,
    },
}

/// Settings for `start-node`: file and environment first, then command-line flags
pub fn node_settings(
    config: Option<&Path>,
    listen: Option<String>,
    peers: Vec<String>,
    db: Option<PathBuf>,
) -> Result<Settings> {
    let mut settings = Settings::load(config)?;
    if let Some(listen) = listen {
        settings.listen_address = listen;
    }
    if !peers.is_empty() {
        settings.seed_peers = peers;
    }
    if let Some(db) = db {
        settings.db_path = db;
    }
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_node_flags() {
        let opt = Opt::try_parse_from([
            "penguin-node",
            "start-node",
            "--listen",
            "127.0.0.1:18020",
            "--peer",
            "127.0.0.1:18018",
            "--peer",
            "127.0.0.1:18019",
        ])
        .unwrap();
        match opt.command {
            Command::StartNode {
                config,
                listen,
                peers,
                db,
            } => {
                assert!(config.is_none());
                assert_eq!(listen.as_deref(), Some("127.0.0.1:18020"));
                assert_eq!(peers, vec!["127.0.0.1:18018", "127.0.0.1:18019"]);
                assert!(db.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(
            &path,
            "listen_address = \"127.0.0.1:1\"\nseed_peers = [\"10.0.0.1:18018\"]\n",
        )
        .unwrap();

        let settings = node_settings(
            Some(&path),
            Some("127.0.0.1:2".to_string()),
            vec![],
            Some(dir.path().join("db")),
        )
        .unwrap();
        assert_eq!(settings.listen_address, "127.0.0.1:2");
        assert_eq!(settings.seed_peers, vec!["10.0.0.1:18018"]);
        assert_eq!(settings.db_path, dir.path().join("db"));
    }

    #[test]
    fn test_sign_tx_requires_key() {
        assert!(Opt::try_parse_from(["penguin-node", "sign-tx", "tx.json"]).is_err());
    }
}
