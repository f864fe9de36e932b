//! Textual naming strategy descriptions, as used by configuration and the CLI.
//!
//! Grammar: `kind[:arg[:arg]][+ext]`, where kind is one of
//! `hash`, `id`, `hash-split:<n>`, `chunked-id:<chunk>:<width>`, `date[:<pattern>]`,
//! `uuid-v5:<namespace>` or `persisted`. A trailing `+ext` appends the original extension.
//! A prefix, when set, is applied outermost.

use std::fmt;
use std::str::FromStr;

use depot_core::{ConfigurationError, DepotConfig};

use super::{
    AppendExtension, ChunkedIdNaming, DateNaming, DeterministicNaming, HashNaming,
    HashSplitNaming, IdNaming, PersistedPath, Prefix, UuidV5Naming,
};

const SETTING: &str = "DEPOT_NAMING";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingKind {
    Hash,
    Id,
    HashSplit(usize),
    ChunkedId { chunk: usize, width: usize },
    Date(Option<String>),
    UuidV5(String),
    Persisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingSpec {
    pub kind: NamingKind,
    pub append_extension: bool,
    pub prefix: Option<String>,
}

fn parse_number(kind: &str, value: Option<&str>) -> Result<usize, ConfigurationError> {
    let value = value.ok_or_else(|| {
        ConfigurationError::invalid(SETTING, format!("'{}' needs a numeric argument", kind))
    })?;
    value.parse().map_err(|_| {
        ConfigurationError::invalid(SETTING, format!("'{}' is not a number in '{}'", value, kind))
    })
}

impl NamingSpec {
    pub fn new(kind: NamingKind) -> Self {
        Self {
            kind,
            append_extension: false,
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    /// Strategy configured through `DEPOT_NAMING` and `DEPOT_NAMING_PREFIX`.
    pub fn from_config(config: &DepotConfig) -> Result<Self, ConfigurationError> {
        Ok(config
            .naming
            .parse::<NamingSpec>()?
            .with_prefix(config.naming_prefix.clone()))
    }

    /// Instantiate the described strategy chain.
    pub fn build(&self) -> Result<Box<dyn DeterministicNaming>, ConfigurationError> {
        let base: Box<dyn DeterministicNaming> = match self.kind {
            NamingKind::Hash => Box::new(HashNaming),
            NamingKind::Id => Box::new(IdNaming),
            NamingKind::HashSplit(chunk) => Box::new(HashSplitNaming::new(chunk)?),
            NamingKind::ChunkedId { chunk, width } => Box::new(ChunkedIdNaming::new(chunk, width)?),
            NamingKind::Date(None) => Box::new(DateNaming::default()),
            NamingKind::Date(Some(ref pattern)) => Box::new(DateNaming::new(pattern.clone())?),
            NamingKind::UuidV5(ref namespace) => Box::new(UuidV5Naming::from_label(namespace)),
            NamingKind::Persisted => Box::new(PersistedPath::new()),
        };

        let naming: Box<dyn DeterministicNaming> = if self.append_extension {
            Box::new(AppendExtension::new(base)?)
        } else {
            base
        };

        match self.prefix {
            Some(ref prefix) => Ok(Box::new(Prefix::new(prefix.clone(), naming)?)),
            None => Ok(naming),
        }
    }
}

impl FromStr for NamingSpec {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (body, append_extension) = match s.strip_suffix("+ext") {
            Some(body) => (body, true),
            None => (s, false),
        };

        let (kind, args) = match body.split_once(':') {
            Some((kind, args)) => (kind, Some(args)),
            None => (body, None),
        };

        let kind = match kind {
            "hash" => NamingKind::Hash,
            "id" => NamingKind::Id,
            "hash-split" => NamingKind::HashSplit(parse_number(kind, args)?),
            "chunked-id" => {
                let (chunk, width) = match args.and_then(|a| a.split_once(':')) {
                    Some((chunk, width)) => (Some(chunk), Some(width)),
                    None => (args, None),
                };
                NamingKind::ChunkedId {
                    chunk: parse_number(kind, chunk)?,
                    width: parse_number(kind, width)?,
                }
            }
            // The pattern may itself contain ':'.
            "date" => NamingKind::Date(args.filter(|a| !a.is_empty()).map(String::from)),
            "uuid-v5" => match args.filter(|a| !a.is_empty()) {
                Some(namespace) => NamingKind::UuidV5(namespace.to_string()),
                None => {
                    return Err(ConfigurationError::invalid(
                        SETTING,
                        "'uuid-v5' needs a namespace",
                    ))
                }
            },
            "persisted" => NamingKind::Persisted,
            other => {
                return Err(ConfigurationError::invalid(
                    SETTING,
                    format!("unknown naming strategy '{}'", other),
                ))
            }
        };

        Ok(NamingSpec {
            kind,
            append_extension,
            prefix: None,
        })
    }
}

impl fmt::Display for NamingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, "{}/", prefix.trim_end_matches('/'))?;
        }
        match self.kind {
            NamingKind::Hash => write!(f, "hash")?,
            NamingKind::Id => write!(f, "id")?,
            NamingKind::HashSplit(n) => write!(f, "hash-split:{}", n)?,
            NamingKind::ChunkedId { chunk, width } => write!(f, "chunked-id:{}:{}", chunk, width)?,
            NamingKind::Date(None) => write!(f, "date")?,
            NamingKind::Date(Some(ref pattern)) => write!(f, "date:{}", pattern)?,
            NamingKind::UuidV5(ref namespace) => write!(f, "uuid-v5:{}", namespace)?,
            NamingKind::Persisted => write!(f, "persisted")?,
        }
        if self.append_extension {
            write!(f, "+ext")?;
        }
        Ok(())
    }
}
