use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use type_gate::Decision;

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// One evaluated type name
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CheckRecord {
    pub type_name: String,
    pub decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl CheckRecord {
    pub fn new(type_name: &str, decision: &Decision) -> Self {
        let (reason, pattern) = match decision {
            Decision::Allow => (None, None),
            Decision::Block(reason) => (
                Some(reason.to_string()),
                reason.pattern().map(str::to_string),
            ),
            Decision::AllowWithWarning(reason) => (Some(reason.clone()), None),
        };
        Self {
            type_name: type_name.to_string(),
            decision: decision.label(),
            reason,
            pattern,
        }
    }

    fn human_line(&self) -> String {
        let mut line = format!("{:<20} {}", self.decision.to_uppercase(), self.type_name);
        match (&self.reason, &self.pattern) {
            (Some(reason), Some(pattern)) => line.push_str(&format!("  ({reason} '{pattern}')")),
            (Some(reason), None) => line.push_str(&format!("  ({reason})")),
            _ => {}
        }
        line
    }
}

/// Render a value for the selected format
pub fn render<T: Serialize>(
    format: &OutputFormat,
    value: &T,
    human: impl FnOnce(&T) -> String,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Human => human(value),
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

pub fn print_records(format: &OutputFormat, records: &[CheckRecord]) -> Result<()> {
    let text = render(format, &records, |records| {
        records
            .iter()
            .map(CheckRecord::human_line)
            .collect::<Vec<_>>()
            .join("\n")
    })?;
    if !text.is_empty() {
        println!("{}", text.trim_end());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use type_gate::BlockReason;

    #[test]
    fn blacklist_block_names_pattern() {
        let record = CheckRecord::new(
            "evil.Payload",
            &Decision::Block(BlockReason::Blacklist {
                pattern: "^evil\\.".into(),
            }),
        );
        assert_eq!(record.decision, "block");
        assert_eq!(record.pattern.as_deref(), Some("^evil\\."));
        assert!(record.human_line().contains("denied by blacklist '^evil\\.'"));
    }

    #[test]
    fn allow_serializes_without_reason() {
        let record = CheckRecord::new("com.acme.Widget", &Decision::Allow);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type_name": "com.acme.Widget", "decision": "allow"})
        );
    }
}
