//! Job presentation: list, detail, and run report formatters.

use super::to_json;
use crate::control::JobProgress;
use crate::error::ApiError;
use crate::generation::RunReport;
use crate::job::{GenerationJob, JobStatus};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

/// Status text, colored when `color` is set
pub fn status_label(status: JobStatus, color: bool) -> String {
    if !color {
        return status.to_string();
    }
    match status {
        JobStatus::Waiting => status.dimmed().to_string(),
        JobStatus::Running => status.cyan().to_string(),
        JobStatus::Finished => status.green().to_string(),
        JobStatus::Stopped => status.yellow().to_string(),
        JobStatus::Error => status.red().to_string(),
    }
}

fn format_duration_ms(duration_ms: u64) -> String {
    format!("{:.1}s", duration_ms as f64 / 1000.0)
}

pub fn format_job_list(jobs: &[GenerationJob], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        let rows: Vec<serde_json::Value> = jobs
            .iter()
            .map(|job| {
                json!({
                    "job": job,
                    "progress": job.progress(),
                })
            })
            .collect();
        return to_json(&rows);
    }
    if jobs.is_empty() {
        return Ok("No generation jobs.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["ID", "Name", "Generator", "Model", "Progress", "Duration", "Status"]);
    for job in jobs {
        table.add_row(vec![
            job.id.to_string(),
            job.name.clone(),
            job.generator_id.to_string(),
            job.model_name.clone(),
            format!("{}/{}", job.generated_count, job.total_count),
            format_duration_ms(job.duration_ms),
            status_label(job.status, true),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_job(job: &GenerationJob, format: &str) -> Result<String, ApiError> {
    let progress = JobProgress::of(job);
    if format == "json" {
        return to_json(&json!({ "job": job, "progress": progress }));
    }

    let mut lines = vec![
        format!("{}", format!("Job {} ({})", job.id, job.name).bold()),
        format!("  Status:      {}", status_label(job.status, true)),
        format!(
            "  Progress:    {}/{} ({:.0}%)",
            job.generated_count,
            job.total_count,
            progress.progress * 100.0
        ),
        format!("  Duration:    {}", format_duration_ms(job.duration_ms)),
        format!("  Generator:   {}", job.generator_id),
        format!("  Model:       {} (temperature {})", job.model_name, job.temperature),
        format!("  Project:     {}", job.project_id),
        format!("  Created:     {}", job.created_at.to_rfc3339()),
    ];
    if let Some(handle) = &job.task_handle {
        lines.push(format!("  Task:        {}", handle));
    }
    if !job.variables.is_empty() {
        lines.push("  Variables:".to_string());
        for (key, value) in &job.variables {
            lines.push(format!("    {} = {}", key, value));
        }
    }
    Ok(lines.join("\n"))
}

pub fn format_run_report(
    job: &GenerationJob,
    report: Option<&RunReport>,
    format: &str,
) -> Result<String, ApiError> {
    if format == "json" {
        let report = report.map(|r| {
            json!({
                "final_status": r.final_status,
                "attempts": r.attempts,
                "dialogs_created": r.dialogs_created,
                "elapsed_ms": r.elapsed.as_millis() as u64,
            })
        });
        return to_json(&json!({ "job": job, "run": report }));
    }

    match report {
        Some(report) => Ok(format!(
            "Job {} {}: {} dialog(s) created in {} attempt(s), {}/{} generated, total duration {}",
            job.id,
            status_label(report.final_status, true),
            report.dialogs_created,
            report.attempts,
            job.generated_count,
            job.total_count,
            format_duration_ms(job.duration_ms)
        )),
        None => Ok(format!(
            "Job {} did not run (status {})",
            job.id,
            status_label(job.status, true)
        )),
    }
}
