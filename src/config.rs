use serde::{Deserialize, Serialize};
use std::{fmt, fs, io, path::Path, path::PathBuf, str::FromStr};

pub const DEFAULT_CONFIG_FILE: &str = "foodo_config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Empty list held in memory.
    Memory,
    /// In-memory list seeded with the sample tasks.
    #[default]
    Sample,
    /// List persisted to `data_file`.
    File,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "sample" => Ok(Self::Sample),
            "file" => Ok(Self::File),
            other => Err(format!("unknown store kind: {other}")),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Sample => write!(f, "sample"),
            Self::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreKind,
    pub data_file: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            data_file: PathBuf::from("foodo.json"),
            log_file: None,
        }
    }
}

impl Config {
    /// Reads the config at `path`, falling back to defaults when it is absent.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
