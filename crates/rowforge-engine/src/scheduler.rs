//! Batch Scheduler
//!
//! Drives a working table through its batches in order. Within a batch every
//! rule runs as one unit of work on a pool bounded by `worker_count`; the
//! batch ends when all units have finished. Results are merged by row id in
//! rule order, so the outcome does not depend on completion order.

use crate::error::EngineError;
use crate::executor::RuleExecutor;
use crate::types::{BatchReport, BatchRow, RowUpdate, RuleFailure};
use rowforge_domain::{BatchPlan, RowId, Rule, Table, TextGenerator, SENTINEL};
use std::collections::HashMap;
use std::fmt::Display;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

type Unit = JoinHandle<Result<Vec<RowUpdate>, EngineError>>;

/// Fans rule executions out over a bounded pool, one batch at a time
pub struct BatchScheduler<G> {
    executor: RuleExecutor<G>,
    worker_count: usize,
}

impl<G> BatchScheduler<G>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    /// Create a scheduler; `worker_count` is raised to at least 1
    pub fn new(executor: RuleExecutor<G>, worker_count: usize) -> Self {
        Self {
            executor,
            worker_count: worker_count.max(1),
        }
    }

    /// Concurrent rule executions per batch
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Start a run over `plan` at batch `start_index`
    ///
    /// The run is lazy: nothing executes until [`BatchRun::next`] is awaited.
    /// Restarting is creating a new run at a later start index.
    pub fn run<'a>(
        &'a self,
        rules: &'a [Rule],
        plan: BatchPlan,
        start_index: usize,
    ) -> BatchRun<'a, G> {
        let next_index = start_index.min(plan.batch_count());
        let processed_rows = plan.range(next_index).map_or(plan.total_rows(), |r| r.start);
        BatchRun {
            scheduler: self,
            rules,
            plan,
            next_index,
            processed_rows,
        }
    }

    async fn process(
        &self,
        rules: &[Rule],
        index: usize,
        count: usize,
        range: Range<usize>,
        table: &mut Table,
    ) -> BatchReport {
        let started = Instant::now();
        info!(
            "Batch {}/{} started: rows {}..{}",
            index + 1,
            count,
            range.start,
            range.end
        );

        for rule in rules {
            for column in &rule.target_columns {
                table.ensure_column(column);
            }
        }

        // Dispatch: one unit per rule, bounded by the semaphore
        let permits = Arc::new(Semaphore::new(self.worker_count));
        let mut units: Vec<(&Rule, Vec<RowId>, Option<Unit>)> = Vec::with_capacity(rules.len());
        for rule in rules {
            let ids: Vec<RowId> = table.rows()[range.clone()].iter().map(|r| r.id.clone()).collect();
            let handle = snapshot(table, &range, &rule.source_column).map(|rows| {
                let executor = self.executor.clone();
                let permits = Arc::clone(&permits);
                let rule = rule.clone();
                tokio::spawn(
                    async move {
                        let _permit = permits
                            .acquire_owned()
                            .await
                            .map_err(|e| EngineError::RuleExecution(e.to_string()))?;
                        executor.execute(&rule, &rows).await
                    }
                    .in_current_span(),
                )
            });
            units.push((rule, ids, handle));
        }

        // Barrier: wait for every unit, merge in rule order
        let mut failures = Vec::new();
        for (rule, ids, handle) in units {
            let outcome = match handle {
                Some(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(EngineError::RuleExecution(format!("worker failed: {}", e))),
                },
                None => Err(EngineError::MissingSourceColumn(rule.source_column.clone())),
            };

            match outcome {
                Ok(updates) => merge(table, rule, &ids, updates),
                Err(e) => {
                    warn!("Rule {} failed for batch {}: {}", rule.id, index + 1, e);
                    fill_sentinel(table, rule, &ids);
                    failures.push(RuleFailure {
                        rule_id: rule.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let succeeded_rows = count_succeeded(table, rules, &range);
        let elapsed = started.elapsed();
        info!(
            "Batch {}/{} complete: {}/{} rows succeeded, {} rule failures, {:.2?}",
            index + 1,
            count,
            succeeded_rows,
            range.len(),
            failures.len(),
            elapsed
        );

        BatchReport {
            index,
            processed_rows: range.end,
            rows: range,
            succeeded_rows,
            failures,
            elapsed,
        }
    }
}

/// A lazy, restartable sequence of batch outcomes
pub struct BatchRun<'a, G> {
    scheduler: &'a BatchScheduler<G>,
    rules: &'a [Rule],
    plan: BatchPlan,
    next_index: usize,
    processed_rows: usize,
}

impl<G> BatchRun<'_, G>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    /// Index of the next batch to run
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Rows processed so far, including rows done before the start index
    pub fn processed_rows(&self) -> usize {
        self.processed_rows
    }

    /// Whether every batch has run
    pub fn is_finished(&self) -> bool {
        self.next_index >= self.plan.batch_count()
    }

    /// Run the next batch and merge it into `table`
    ///
    /// Returns `None` once every batch has run, or when `table` does not
    /// have the row count the plan was built for. Rule failures never end
    /// the sequence; they appear in the report.
    pub async fn next(&mut self, table: &mut Table) -> Option<BatchReport> {
        if table.len() != self.plan.total_rows() {
            warn!(
                "Batch plan covers {} rows but the table has {}",
                self.plan.total_rows(),
                table.len()
            );
            return None;
        }
        let range = self.plan.range(self.next_index)?;
        let report = self
            .scheduler
            .process(self.rules, self.next_index, self.plan.batch_count(), range, table)
            .await;
        self.next_index += 1;
        self.processed_rows = report.processed_rows;
        Some(report)
    }
}

/// Source values for a batch, or `None` if the column does not exist
fn snapshot(table: &Table, range: &Range<usize>, source_column: &str) -> Option<Vec<BatchRow>> {
    let column = table.column_index(source_column)?;
    Some(
        table.rows()[range.clone()]
            .iter()
            .map(|row| BatchRow {
                id: row.id.clone(),
                source: row.values.get(column).cloned().unwrap_or_default(),
            })
            .collect(),
    )
}

fn merge(table: &mut Table, rule: &Rule, ids: &[RowId], updates: Vec<RowUpdate>) {
    let mut by_id: HashMap<RowId, Vec<String>> = updates
        .into_iter()
        .map(|update| (update.row_id, update.values))
        .collect();

    for id in ids {
        let mut values = by_id.remove(id).unwrap_or_default().into_iter();
        for column in &rule.target_columns {
            let value = values.next().unwrap_or_else(|| SENTINEL.to_string());
            table.set(id, column, value);
        }
    }
}

fn fill_sentinel(table: &mut Table, rule: &Rule, ids: &[RowId]) {
    for id in ids {
        for column in &rule.target_columns {
            table.set(id, column, SENTINEL);
        }
    }
}

fn count_succeeded(table: &Table, rules: &[Rule], range: &Range<usize>) -> usize {
    let columns: Vec<usize> = rules
        .iter()
        .flat_map(|rule| rule.target_columns.iter())
        .filter_map(|column| table.column_index(column))
        .collect();

    table.rows()[range.clone()]
        .iter()
        .filter(|row| columns.iter().any(|&c| row.values[c] != SENTINEL))
        .count()
}
