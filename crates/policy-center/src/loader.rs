use typegate_core_types::OriginId;
use tracing::debug;

use crate::errors::PolicyError;
use crate::model::{Policy, PolicyDocument};
use crate::source::{ConfigSource, SourceStamp};

/// Parses a policy document.
///
/// Text opening with `{` or `[` is tried as JSON first and YAML second; any
/// other text is YAML only, so its errors are not buried under a JSON one.
pub fn parse_document(raw: &str) -> Result<PolicyDocument, PolicyError> {
    let looks_like_json = matches!(raw.trim_start().chars().next(), Some('{') | Some('['));
    if !looks_like_json {
        return serde_yaml::from_str(raw)
            .map_err(|yaml_err| PolicyError::Invalid(format!("yaml error: {}", yaml_err)));
    }
    match serde_json::from_str(raw) {
        Ok(document) => Ok(document),
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            PolicyError::Invalid(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        }),
    }
}

/// Compiles a policy from raw text. Blank input is rejected before parsing.
pub fn compile_policy(
    origin: &OriginId,
    raw: &str,
    version: u64,
) -> Result<Policy, PolicyError> {
    if raw.trim().is_empty() {
        return Err(PolicyError::EmptySource(origin.to_string()));
    }
    let document = parse_document(raw)?;
    Policy::compile(origin.clone(), &document, version)
}

/// Reads and compiles the source, returning the stamp observed before the read.
///
/// Taking the stamp first means a write racing with the read is picked up by
/// the next reload check instead of being lost.
pub fn load_policy(
    origin: &OriginId,
    source: &dyn ConfigSource,
    version: u64,
) -> Result<(Policy, SourceStamp), PolicyError> {
    let stamp = source.stamp()?;
    let raw = source.read()?;
    let policy = compile_policy(origin, &raw, version)?;
    debug!(
        origin = %origin,
        source = %source.describe(),
        version,
        deny = policy.deny().len(),
        allow = policy.allow().len(),
        profiling = policy.is_profiling(),
        "policy compiled"
    );
    Ok((policy, stamp))
}
