//! Configuration handling.
//!
//! Settings come from, in increasing precedence: built-in defaults, an optional
//! `.ledger-sync.toml`, then the command line (whose Google settings also read the
//! environment, `.env` included). The merged `Config` is built once in `main` and
//! handed by reference to everything that needs it.

use crate::{data::Error, google::ServiceAccountKey};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = ".ledger-sync.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the ledger comes from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Which spreadsheet and tabs to write.
    #[serde(default)]
    pub sheet: SheetConfig,

    /// Service-account credentials.
    #[serde(default)]
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// CSV file to load on every cycle.
    #[serde(default = "default_source")]
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source(),
        }
    }
}

fn default_source() -> PathBuf {
    PathBuf::from("data.csv")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Spreadsheet identifier, the long token in the sheet's URL.
    #[serde(default)]
    pub id: Option<String>,

    /// Tab the raw rows are appended to.
    #[serde(default = "default_raw_tab")]
    pub raw_tab: String,

    /// Tab rewritten with the summary on every cycle.
    #[serde(default = "default_summary_tab")]
    pub summary_tab: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            id: None,
            raw_tab: default_raw_tab(),
            summary_tab: default_summary_tab(),
        }
    }
}

fn default_raw_tab() -> String {
    "Sheet1".to_string()
}

fn default_summary_tab() -> String {
    "Summary".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Service-account address; taken from the key file when unset.
    #[serde(default)]
    pub service_account_email: Option<String>,

    /// Service-account JSON key.
    #[serde(default = "default_credentials")]
    pub credentials_file: PathBuf,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            service_account_email: None,
            credentials_file: default_credentials(),
        }
    }
}

fn default_credentials() -> PathBuf {
    PathBuf::from("credentials.json")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `.ledger-sync.toml` from the working directory if there is one.
    pub fn load_default() -> anyhow::Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Apply command-line overrides; only values actually given replace the file's.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref path) = args.csv {
            self.source.path = path.clone();
        }
        if let Some(ref id) = args.sheet_id {
            self.sheet.id = Some(id.clone());
        }
        if let Some(ref tab) = args.raw_tab {
            self.sheet.raw_tab = tab.clone();
        }
        if let Some(ref tab) = args.summary_tab {
            self.sheet.summary_tab = tab.clone();
        }
        if let Some(ref email) = args.service_account_email {
            self.google.service_account_email = Some(email.clone());
        }
        if let Some(ref path) = args.credentials {
            self.google.credentials_file = path.clone();
        }
    }

    /// Checks that don't need the network: a spreadsheet id is set, tab names are
    /// usable and the ledger file is there.
    pub fn validate(&self) -> Result<(), Error> {
        self.sheet_id()?;
        if self.sheet.raw_tab.trim().is_empty() || self.sheet.summary_tab.trim().is_empty() {
            return Err(Error::Config("tab names must not be empty".into()));
        }
        if !self.source.path.exists() {
            return Err(Error::Config(format!(
                "CSV file not found: {}",
                self.source.path.display()
            )));
        }
        Ok(())
    }

    pub fn sheet_id(&self) -> Result<&str, Error> {
        match self.sheet.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(Error::Config(
                "GOOGLE_SHEET_ID is required (set it in the environment, .env or --sheet-id)"
                    .into(),
            )),
        }
    }

    /// Read the service-account key, checking it against the configured account
    /// address when one was given.
    pub fn service_account(&self) -> Result<ServiceAccountKey, Error> {
        let path = &self.google.credentials_file;
        if !path.exists() {
            return Err(Error::Config(format!(
                "Credentials file not found: {}",
                path.display()
            )));
        }
        let key = ServiceAccountKey::load(path)?;
        match self.google.service_account_email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() && email != key.client_email => {
                Err(Error::Config(format!(
                    "service account {email} does not match {} in {}",
                    key.client_email,
                    path.display()
                )))
            }
            _ => Ok(key),
        }
    }

    /// The settings a run would use, one per line, for `--check-config`.
    pub fn describe(&self, key: &ServiceAccountKey) -> Result<String, Error> {
        Ok(format!(
            "Service account:  {}\n\
             Credentials file: {}\n\
             Sheet id:         {}\n\
             CSV file:         {}\n\
             Raw tab:          {}\n\
             Summary tab:      {}",
            key.client_email,
            self.google.credentials_file.display(),
            self.sheet_id()?,
            self.source.path.display(),
            self.sheet.raw_tab,
            self.sheet.summary_tab,
        ))
    }

    /// Default configuration rendered as TOML, for `--init-config`.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
