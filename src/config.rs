use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::error::Error;

/// Header prepended to encrypted configuration files so they can be told
/// apart from plain JSON without a password.
const MAGIC: &[u8] = b"redoubtconf+";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub repositories: HashMap<String, RepoConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    pub url: String,
    pub compression: String,
    pub encryption: String,
    pub tolerance: u32,
}

/// Configuration store behind a `crypto://<password>@<path>` URL. A plain
/// path opens an unencrypted JSON store instead.
pub struct ConfigStore {
    path: PathBuf,
    password: Option<String>,
}

impl ConfigStore {
    pub fn open(url: &str) -> Result<Self, Error> {
        match url.strip_prefix("crypto://") {
            Some(rest) => {
                let (password, path) = rest
                    .split_once('@')
                    .ok_or_else(|| Error::Config(format!("missing password in url {url}")))?;
                if path.is_empty() {
                    return Err(Error::Config(format!("missing path in url {url}")));
                }
                Ok(ConfigStore {
                    path: PathBuf::from(path),
                    password: Some(password.to_string()),
                })
            }
            None => Ok(ConfigStore {
                path: PathBuf::from(url),
                password: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, decrypt and deserialize the configuration. A wrong password
    /// surfaces the cipher-auth error verbatim.
    pub fn load(&self) -> Result<Config, Error> {
        let raw = fs::read(&self.path)?;
        let json = match &self.password {
            Some(password) => {
                let body = raw.strip_prefix(MAGIC).ok_or_else(|| {
                    Error::Config(format!("{} is not an encrypted config", self.path.display()))
                })?;
                crypto::decrypt(password, body)?
            }
            None => raw,
        };
        serde_json::from_slice(&json)
            .map_err(|e| Error::Config(format!("parse {}: {e}", self.path.display())))
    }

    /// Serialize, encrypt and atomically replace the configuration file
    /// (temp file in the target directory, fsync, rename).
    pub fn save(&self, config: &Config) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(config)
            .map_err(|e| Error::Config(format!("serialize config: {e}")))?;
        let payload = match &self.password {
            Some(password) => {
                let mut out = MAGIC.to_vec();
                out.extend_from_slice(&crypto::encrypt(password, &json)?);
                out
            }
            None => json,
        };

        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let tmp = dir.join(format!(
            ".{}.tmp",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "config".into())
        ));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// True when the file at `path` carries the encrypted-config header.
pub fn is_encrypted(path: &Path) -> Result<bool, Error> {
    let raw = fs::read(path)?;
    Ok(raw.starts_with(MAGIC))
}
