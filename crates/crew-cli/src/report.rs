//! Human readable run summaries

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use crew_workflow::{RunResult, StepStatus};

fn status_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Succeeded => "ok",
        StepStatus::Failed => "failed",
        StepStatus::Cancelled => "cancelled",
    }
}

/// One row per executed step: status, attempts, time and last error
pub fn step_table(run: &RunResult) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Step", "Status", "Attempts", "Time", "Last error"]);

    for step in &run.steps {
        table.add_row(vec![
            step.name.clone(),
            status_label(step.status).to_string(),
            step.attempts.to_string(),
            format!("{:.1}s", step.duration_ms as f64 / 1000.0),
            step.errors.last().cloned().unwrap_or_default(),
        ]);
    }
    table
}

/// Short footer naming the run and how it ended
pub fn summary_line(run: &RunResult) -> String {
    let elapsed = run.finished_at - run.started_at;
    match &run.failure {
        None => format!(
            "run {} succeeded in {:.1}s",
            run.run_id,
            elapsed.num_milliseconds() as f64 / 1000.0
        ),
        Some(failure) => format!(
            "run {} failed at '{}' ({}): {}",
            run.run_id, failure.step_name, failure.kind, failure.message
        ),
    }
}
