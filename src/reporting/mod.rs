//! Reporting Projector (C9, `spec.md` §4's component table + SPEC_FULL.md
//! §F.5).
//!
//! Pure read-side aggregation: joins a run's `TestExecution` rows with
//! their `ExecutionArtifact` children, grounded in the same
//! aggregate-read-over-owned-children shape as the teacher's
//! `cache/metadata.rs::list_cached_specs`.

use crate::error::Error;
use crate::model::{ExecutionArtifact, ExecutionStatus, Id, TestExecution, TestRun};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: TestRun,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub running: usize,
    pub duration_ms: Option<i64>,
    pub executions: Vec<ExecutionDetail>,
}

#[derive(Debug, Clone)]
pub struct ExecutionDetail {
    pub execution: TestExecution,
    pub artifacts: Vec<ExecutionArtifact>,
}

/// Builds the full projection for `run_ref`. Executions are returned in
/// the order the store lists them (creation order); artifacts within an
/// execution are ordered by `createdAt` ascending.
pub async fn summarize(store: &dyn Store, run_ref: Id) -> Result<RunSummary, Error> {
    let run = store.get_run(run_ref).await?;
    let executions = store.list_executions(run_ref).await?;

    let mut passed = 0;
    let mut failed = 0;
    let mut running = 0;
    let mut details = Vec::with_capacity(executions.len());

    for execution in executions {
        match execution.status {
            ExecutionStatus::Passed => passed += 1,
            ExecutionStatus::Failed => failed += 1,
            ExecutionStatus::Running => running += 1,
        }
        let mut artifacts = store.list_artifacts(execution.id).await?;
        artifacts.sort_by_key(|a| a.created_at);
        details.push(ExecutionDetail { execution, artifacts });
    }

    let duration_ms = run
        .completed_at
        .map(|end| (end - run.started_at).num_milliseconds());

    Ok(RunSummary {
        total: details.len(),
        passed,
        failed,
        running,
        duration_ms,
        run,
        executions: details,
    })
}
