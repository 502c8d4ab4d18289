// wg-gen-web client name lookup

//! Friendly peer names from wg-gen-web
//!
//! wg-gen-web stores one JSON file per client, named after the client UUID,
//! holding among other things the client `name` and its `publicKey`.

use crate::types::PeerSnapshot;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Dash-separated parts of a UUID file name
const UUID_PARTS: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientFile {
    name: String,
    public_key: String,
}

/// Reads wg-gen-web client files from a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WgGenWebNames {
    path: PathBuf,
}

impl WgGenWebNames {
    /// Create a lookup over the wg-gen-web storage directory
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Map of public key to client name
    ///
    /// Files that cannot be parsed are skipped with a warning; an unreadable
    /// directory is an error.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        let entries = fs::read_dir(&self.path)
            .with_context(|| format!("Failed to read wg-gen-web directory {:?}", self.path))?;

        let mut names = HashMap::new();
        for entry in entries {
            let entry = entry.context("Failed to read wg-gen-web directory entry")?;
            let file_name = entry.file_name();
            if !is_client_file_name(&file_name.to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            match read_client(&path) {
                Ok(client) => {
                    names.insert(client.public_key, client.name);
                }
                Err(e) => log::warn!("Skipping wg-gen-web client {:?}: {:#}", path, e),
            }
        }

        Ok(names)
    }

    /// Set the name of every peer found in the wg-gen-web clients
    pub fn annotate(&self, peers: &mut [PeerSnapshot]) -> Result<()> {
        let names = self.load()?;
        for peer in peers {
            peer.name = names.get(&peer.identity.public_key).cloned();
        }
        Ok(())
    }
}

fn read_client(path: &Path) -> Result<ClientFile> {
    let contents = fs::read_to_string(path).context("Failed to read client file")?;
    serde_json::from_str(&contents).context("Failed to parse client file")
}

/// Client files are named after a UUID: `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`
fn is_client_file_name(name: &str) -> bool {
    name.split('-').count() >= UUID_PARTS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeerIdentity;
    use std::fs;

    fn peer(key: &str) -> PeerSnapshot {
        PeerSnapshot {
            identity: PeerIdentity::new("wg0", key),
            endpoint: None,
            allowed_ips: Vec::new(),
            latest_handshake: 0,
            name: None,
        }
    }

    fn write_client(dir: &Path, file: &str, name: &str, key: &str) {
        let body = format!(
            r#"{{"id": "{}", "name": "{}", "publicKey": "{}", "enable": true}}"#,
            file, name, key
        );
        fs::write(dir.join(file), body).unwrap();
    }

    #[test]
    fn test_is_client_file_name() {
        assert!(is_client_file_name("0d1f3c1e-6b7a-4a8e-9a57-3a1c5a4e2f10"));
        assert!(!is_client_file_name("server.json"));
        assert!(!is_client_file_name("wg0.conf"));
        assert!(!is_client_file_name("a-b-c-d"));
    }

    #[test]
    fn test_load_names() {
        let dir = tempfile::tempdir().unwrap();
        write_client(dir.path(), "11111111-1111-1111-1111-111111111111", "laptop", "keyA");
        write_client(dir.path(), "22222222-2222-2222-2222-222222222222", "phone", "keyB");
        fs::write(dir.path().join("server.json"), r#"{"name": "srv", "publicKey": "keyS"}"#)
            .unwrap();

        let names = WgGenWebNames::new(dir.path()).load().unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names.get("keyA").map(String::as_str), Some("laptop"));
        assert_eq!(names.get("keyB").map(String::as_str), Some("phone"));
        assert!(!names.contains_key("keyS"));
    }

    #[test]
    fn test_load_skips_invalid_client() {
        let dir = tempfile::tempdir().unwrap();
        write_client(dir.path(), "11111111-1111-1111-1111-111111111111", "laptop", "keyA");
        fs::write(
            dir.path().join("33333333-3333-3333-3333-333333333333"),
            "not json",
        )
        .unwrap();

        let names = WgGenWebNames::new(dir.path()).load().unwrap();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let names = WgGenWebNames::new(dir.path().join("missing"));
        assert!(names.load().is_err());
    }

    #[test]
    fn test_annotate() {
        let dir = tempfile::tempdir().unwrap();
        write_client(dir.path(), "11111111-1111-1111-1111-111111111111", "laptop", "keyA");

        let mut peers = vec![peer("keyA"), peer("unknown")];
        WgGenWebNames::new(dir.path()).annotate(&mut peers).unwrap();

        assert_eq!(peers[0].name.as_deref(), Some("laptop"));
        assert_eq!(peers[1].name, None);
    }
}
