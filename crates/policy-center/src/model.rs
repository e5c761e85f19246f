use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use typegate_core_types::OriginId;

use crate::errors::PolicyError;
use crate::pattern::PatternSet;

/// Raw configuration document as read from a source.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub mode: ModeSection,
    #[serde(default, deserialize_with = "null_as_default")]
    pub blacklist: PatternList,
    #[serde(default, deserialize_with = "null_as_default")]
    pub whitelist: PatternList,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ModeSection {
    #[serde(default)]
    pub profiling: bool,
}

/// A pattern list, either flat or nested under `regexps`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PatternList {
    Flat(Vec<String>),
    Nested {
        #[serde(default, deserialize_with = "null_as_default")]
        regexps: Vec<String>,
    },
}

/// A key written without a value (`blacklist:` or `whitelist: ~`) means empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for PatternList {
    fn default() -> Self {
        PatternList::Flat(Vec::new())
    }
}

impl PatternList {
    pub fn entries(&self) -> &[String] {
        match self {
            PatternList::Flat(entries) => entries,
            PatternList::Nested { regexps } => regexps,
        }
    }
}

/// Immutable, compiled policy snapshot for one origin.
#[derive(Debug)]
pub struct Policy {
    origin: OriginId,
    deny: PatternSet,
    allow: PatternSet,
    profiling: bool,
    version: u64,
    loaded_at: DateTime<Utc>,
}

impl Policy {
    /// Deny list is compiled before the allow list; either failing aborts the build.
    pub fn compile(
        origin: OriginId,
        document: &PolicyDocument,
        version: u64,
    ) -> Result<Self, PolicyError> {
        let deny = PatternSet::compile(document.blacklist.entries().iter().cloned())?;
        let allow = PatternSet::compile(document.whitelist.entries().iter().cloned())?;
        Ok(Self::new(origin, deny, allow, document.mode.profiling, version))
    }

    pub fn new(
        origin: OriginId,
        deny: PatternSet,
        allow: PatternSet,
        profiling: bool,
        version: u64,
    ) -> Self {
        Self {
            origin,
            deny,
            allow,
            profiling,
            version,
            loaded_at: Utc::now(),
        }
    }

    pub fn origin(&self) -> &OriginId {
        &self.origin
    }

    pub fn deny(&self) -> &PatternSet {
        &self.deny
    }

    pub fn allow(&self) -> &PatternSet {
        &self.allow
    }

    pub fn is_profiling(&self) -> bool {
        self.profiling
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn summary(&self) -> PolicySummary {
        PolicySummary::from(self)
    }
}

/// Serializable view of a policy for diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicySummary {
    pub origin: String,
    pub version: u64,
    pub profiling: bool,
    pub blacklist: Vec<String>,
    pub whitelist: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

impl From<&Policy> for PolicySummary {
    fn from(policy: &Policy) -> Self {
        Self {
            origin: policy.origin.to_string(),
            version: policy.version,
            profiling: policy.profiling,
            blacklist: policy.deny.sources(),
            whitelist: policy.allow.sources(),
            loaded_at: policy.loaded_at,
        }
    }
}
