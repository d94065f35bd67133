//! CLI presentation: text and json formatters per command family.

mod dialog;
mod generator;
mod job;

pub use dialog::{format_dialog, format_dialog_list, format_feedback, format_feedback_list};
pub use generator::{format_generator, format_generator_created, format_generator_list};
pub use job::{format_job, format_job_list, format_run_report, status_label};

use crate::error::{ApiError, StorageError};
use serde::Serialize;

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Corrupt(e.to_string())))
}

/// Shorten long text for table cells
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
