//! Generator presentation.

use super::{preview, to_json};
use crate::error::ApiError;
use crate::generator::Generator;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_generator(generator: &Generator, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(generator);
    }
    let mut lines = vec![
        format!("{}", format!("Generator {} ({})", generator.id, generator.name).bold()),
        format!("  Project: {}", generator.project_id),
        format!("  Created: {}", generator.created_at.to_rfc3339()),
        format!("  Steps:   {}", generator.steps()),
    ];
    for (index, template) in generator.templates.iter().enumerate() {
        lines.push(format!("  {}. {}", index + 1, template));
    }
    Ok(lines.join("\n"))
}

pub fn format_generator_created(
    generator: &Generator,
    warnings: &[String],
    format: &str,
) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&serde_json::json!({
            "generator": generator,
            "warnings": warnings,
        }));
    }
    let mut out = format!(
        "Created generator {} ({} step(s))",
        generator.id,
        generator.steps()
    );
    for warning in warnings {
        out.push_str(&format!("\n  {} {}", "warning:".yellow(), warning));
    }
    Ok(out)
}

pub fn format_generator_list(generators: &[Generator], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(generators);
    }
    if generators.is_empty() {
        return Ok("No generators.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["ID", "Name", "Steps", "First template"]);
    for generator in generators {
        table.add_row(vec![
            generator.id.to_string(),
            generator.name.clone(),
            generator.steps().to_string(),
            generator
                .templates
                .first()
                .map(|t| preview(t, 48))
                .unwrap_or_default(),
        ]);
    }
    Ok(table.to_string())
}
