//! Rule files.
//!
//! ```toml
//! [[rule]]
//! rule_id = "address"          # optional
//! source_column = "notes"
//! target_columns = ["city", "zip"]
//! prompt = "Extract the city and postal code"
//! ```

use crate::error::{CliError, Result};
use rowforge_domain::{Rule, RuleId};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleDef>,
}

#[derive(Debug, Deserialize)]
struct RuleDef {
    rule_id: Option<String>,
    source_column: String,
    target_columns: Vec<String>,
    prompt: String,
}

/// Parse rule definitions from TOML text.
pub fn parse_rules(text: &str) -> Result<Vec<Rule>> {
    let file: RulesFile = toml::from_str(text)?;
    if file.rules.is_empty() {
        return Err(CliError::InvalidInput(
            "rules file defines no [[rule]] tables".to_string(),
        ));
    }

    let mut rules = Vec::with_capacity(file.rules.len());
    for def in file.rules {
        let rule = match def.rule_id {
            Some(id) => Rule::with_id(RuleId::from(id), def.source_column, def.target_columns, def.prompt)?,
            None => Rule::new(def.source_column, def.target_columns, def.prompt)?,
        };
        if rules.iter().any(|r: &Rule| r.id == rule.id) {
            return Err(CliError::InvalidInput(format!("duplicate rule_id '{}'", rule.id)));
        }
        rules.push(rule);
    }
    Ok(rules)
}

/// Load rule definitions from a TOML file.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    parse_rules(&fs::read_to_string(path)?)
}
