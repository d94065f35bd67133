//! Dialog and feedback presentation.

use super::{preview, to_json};
use crate::dialog::{Dialog, Feedback, ReviewStatus};
use crate::error::ApiError;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

fn review_label(status: ReviewStatus) -> String {
    match status {
        ReviewStatus::Canon => status.green().to_string(),
        ReviewStatus::Removed => status.red().to_string(),
        ReviewStatus::Testing | ReviewStatus::Candidate => status.to_string(),
    }
}

pub fn format_dialog(dialog: &Dialog, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(dialog);
    }
    let mut lines = vec![
        format!("{}", format!("Dialog {}", dialog.id).bold()),
        format!("  Status:  {}", review_label(dialog.status)),
        format!("  Edited:  {}", dialog.edited),
        format!("  Project: {}", dialog.project_id),
    ];
    if let Some(job_id) = dialog.generation_job_id {
        lines.push(format!("  Job:     {}", job_id));
    }
    for (key, value) in &dialog.attrs {
        lines.push(format!("  {} = {}", key, value));
    }
    lines.push(String::new());
    lines.push(dialog.content.clone());
    Ok(lines.join("\n"))
}

pub fn format_dialog_list(dialogs: &[Dialog], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(dialogs);
    }
    if dialogs.is_empty() {
        return Ok("No dialogs.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["ID", "Job", "Status", "Edited", "Content"]);
    for dialog in dialogs {
        table.add_row(vec![
            dialog.id.to_string(),
            dialog
                .generation_job_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            review_label(dialog.status),
            if dialog.edited { "yes" } else { "" }.to_string(),
            preview(&dialog.content, 60),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_feedback(feedback: &Feedback, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(feedback);
    }
    Ok(format!(
        "Recorded feedback from user {} on dialog {}",
        feedback.user_id, feedback.dialog_id
    ))
}

pub fn format_feedback_list(entries: &[Feedback], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(entries);
    }
    if entries.is_empty() {
        return Ok("No feedback.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["User", "Comment", "Created"]);
    for entry in entries {
        table.add_row(vec![
            entry.user_id.to_string(),
            preview(&entry.comment, 60),
            entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    Ok(table.to_string())
}
