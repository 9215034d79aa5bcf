//! Rule Executor: one rule over one batch

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::parser::{interpret, ParseOutcome};
use crate::prompt::PromptBuilder;
use crate::types::{BatchRow, RowUpdate};
use rowforge_domain::{RowId, Rule, TextGenerator};
use std::fmt::Display;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

/// Runs a rule against a batch: prompt, generate, interpret
pub struct RuleExecutor<G> {
    generator: Arc<G>,
    config: Arc<EngineConfig>,
}

impl<G> Clone for RuleExecutor<G> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            config: Arc::clone(&self.config),
        }
    }
}

impl<G> RuleExecutor<G>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    /// Create a new executor
    pub fn new(generator: Arc<G>, config: EngineConfig) -> Self {
        Self {
            generator,
            config: Arc::new(config),
        }
    }

    /// Engine configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute `rule` for `rows`
    ///
    /// Returns one update per input row, in input order. A failed or timed
    /// out call, or a reply with no decodable list, fails the whole unit.
    pub async fn execute(&self, rule: &Rule, rows: &[BatchRow]) -> Result<Vec<RowUpdate>, EngineError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = PromptBuilder::new(rule, rows).build();
        debug!(
            "Rule {} prompt: {} chars for {} rows",
            rule.id,
            prompt.len(),
            rows.len()
        );
        if self.config.log_prompts {
            debug!("Rule {} prompt body:\n{}", rule.id, prompt);
        }

        // Call the service with timeout
        let reply = timeout(self.config.request_timeout(), self.generator.generate(&prompt))
            .await
            .map_err(|_| EngineError::Timeout)?
            .map_err(|e| EngineError::RuleExecution(e.to_string()))?;

        debug!("Rule {} reply: {} chars", rule.id, reply.len());
        if self.config.log_responses {
            debug!("Rule {} reply body:\n{}", rule.id, reply);
        }

        let row_ids: Vec<RowId> = rows.iter().map(|row| row.id.clone()).collect();
        match interpret(&reply, &rule.target_columns, &row_ids) {
            ParseOutcome::Rows(values) => Ok(row_ids
                .into_iter()
                .zip(values)
                .map(|(row_id, values)| RowUpdate { row_id, values })
                .collect()),
            ParseOutcome::Failed(reason) => Err(EngineError::ResponseParse(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowforge_llm::MockProvider;
    use std::time::Duration;

    fn rule() -> Rule {
        Rule::new("text", vec!["a".into(), "b".into()], "Split the text.").unwrap()
    }

    fn rows(n: usize) -> Vec<BatchRow> {
        (0..n)
            .map(|i| BatchRow {
                id: RowId::ordinal(i),
                source: format!("value {}", i),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_execute_returns_one_update_per_row() {
        let llm = MockProvider::new(r#"[{"a": "x", "b": "y"}, {"a": "z"}]"#);
        let executor = RuleExecutor::new(Arc::new(llm), EngineConfig::default());

        let updates = executor.execute(&rule(), &rows(3)).await.unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].values, vec!["x", "y"]);
        assert_eq!(updates[1].values, vec!["z", ""]);
        assert_eq!(updates[2].row_id, RowId::ordinal(2));
        assert_eq!(updates[2].values, vec!["", ""]);
    }

    #[tokio::test]
    async fn test_execute_sends_source_values() {
        let llm = Arc::new(MockProvider::new("[]"));
        let executor = RuleExecutor::new(Arc::clone(&llm), EngineConfig::default());

        executor.execute(&rule(), &rows(2)).await.unwrap();
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("value 0"));
        assert!(prompts[0].contains("value 1"));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_call() {
        let llm = Arc::new(MockProvider::new("[]"));
        let executor = RuleExecutor::new(Arc::clone(&llm), EngineConfig::default());

        let updates = executor.execute(&rule(), &[]).await.unwrap();
        assert!(updates.is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_service_error_fails_unit() {
        let llm = MockProvider::default();
        llm.add_error("Split");
        let executor = RuleExecutor::new(Arc::new(llm), EngineConfig::default());

        let result = executor.execute(&rule(), &rows(1)).await;
        assert!(matches!(result, Err(EngineError::RuleExecution(_))));
    }

    #[tokio::test]
    async fn test_garbled_reply_fails_unit() {
        let llm = MockProvider::new("garbled text with no brackets");
        let executor = RuleExecutor::new(Arc::new(llm), EngineConfig::default());

        let result = executor.execute(&rule(), &rows(2)).await;
        assert!(matches!(result, Err(EngineError::ResponseParse(_))));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let llm = MockProvider::new("[]").with_delay(Duration::from_millis(1_500));
        let config = EngineConfig {
            request_timeout_secs: 1,
            ..EngineConfig::default()
        };
        let executor = RuleExecutor::new(Arc::new(llm), config);

        let result = executor.execute(&rule(), &rows(1)).await;
        assert_eq!(result, Err(EngineError::Timeout));
    }
}
