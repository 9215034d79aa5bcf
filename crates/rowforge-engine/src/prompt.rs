//! Prompt construction for rule execution

use crate::types::BatchRow;
use rowforge_domain::Rule;

/// Builds the single request sent for one rule over one batch
pub struct PromptBuilder<'a> {
    rule: &'a Rule,
    rows: &'a [BatchRow],
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(rule: &'a Rule, rows: &'a [BatchRow]) -> Self {
        Self { rule, rows }
    }

    /// Build the complete prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        // 1. The user's instruction
        prompt.push_str(self.rule.instruction.trim());
        prompt.push_str("\n\n");

        // 2. Target columns and output contract
        prompt.push_str(&format!(
            "Target columns: {}\n\n",
            self.rule.target_columns.join(", ")
        ));
        prompt.push_str("Output requirements:\n");
        prompt.push_str(
            "1. Return a JSON array with exactly one object per record, in the order the records are listed.\n",
        );
        prompt.push_str(&format!(
            "2. Every object must contain the fields {}.\n",
            self.field_list()
        ));
        prompt.push_str("3. \"row_id\" must repeat the record's row_id exactly.\n");
        prompt.push_str("4. Use an empty string for any value that cannot be determined.\n\n");

        // 3. The records
        prompt.push_str("Records:\n");
        for (n, row) in self.rows.iter().enumerate() {
            prompt.push_str(&format!("Record {} (row_id: {}):\n", n + 1, row.id));
            prompt.push_str(&row.source);
            prompt.push_str("\n\n");
        }

        // 4. Output format reminder
        prompt.push_str("Output format example:\n");
        prompt.push_str(&self.example());
        prompt.push_str("\n\n");
        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        prompt
    }

    fn field_list(&self) -> String {
        std::iter::once("row_id")
            .chain(self.rule.target_columns.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn example(&self) -> String {
        let row_id = self
            .rows
            .first()
            .map(|row| row.id.as_str())
            .unwrap_or("<row_id>");
        let mut fields = vec![format!("{}: {}", quote("row_id"), quote(row_id))];
        for column in &self.rule.target_columns {
            fields.push(format!("{}: \"...\"", quote(column)));
        }
        format!("[\n  {{{}}}\n]", fields.join(", "))
    }
}

fn quote(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

const OUTPUT_FORMAT_REMINDER: &str =
    "Remember: Return ONLY valid JSON, no markdown code blocks, no explanations.";
