//! Generators: ordered prompt-template chains.

use crate::generation::chain::PLACEHOLDER;
use crate::types::{GeneratorId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub id: GeneratorId,
    pub project_id: ProjectId,
    pub name: String,
    /// Prompt templates in execution order; never empty once stored
    pub templates: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Generator {
    /// Number of API calls one chain execution makes
    pub fn steps(&self) -> usize {
        self.templates.len()
    }
}

/// Request to create a generator
#[derive(Debug, Clone)]
pub struct NewGenerator {
    pub project_id: ProjectId,
    pub name: String,
    pub templates: Vec<String>,
}

impl NewGenerator {
    /// Reject empty chains and templates that would send an empty prompt.
    ///
    /// Returns warnings for templates past the first that never reference the
    /// previous step's output.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        if self.name.trim().is_empty() {
            return Err("generator name cannot be empty".to_string());
        }
        if self.templates.is_empty() {
            return Err("generator needs at least one prompt template".to_string());
        }
        if let Some(index) = self.templates.iter().position(|t| t.trim().is_empty()) {
            return Err(format!("prompt template {} is empty", index + 1));
        }

        let warnings = self
            .templates
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, template)| !template.contains(PLACEHOLDER))
            .map(|(index, _)| {
                format!(
                    "prompt template {} has no '{}' placeholder; the previous step's output is discarded",
                    index + 1,
                    PLACEHOLDER
                )
            })
            .collect();
        Ok(warnings)
    }

    pub(crate) fn into_generator(self, id: GeneratorId, created_at: DateTime<Utc>) -> Generator {
        Generator {
            id,
            project_id: self.project_id,
            name: self.name,
            templates: self.templates,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(templates: &[&str]) -> NewGenerator {
        NewGenerator {
            project_id: 1,
            name: "tavern".to_string(),
            templates: templates.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(request(&[]).validate().is_err());
    }

    #[test]
    fn test_blank_template_rejected() {
        let err = request(&["A", "  "]).validate().unwrap_err();
        assert!(err.contains("template 2"));
    }

    #[test]
    fn test_missing_placeholder_warns() {
        let warnings = request(&["A", "no marker here", "do ^^ more"])
            .validate()
            .unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("template 2"));
    }

    #[test]
    fn test_first_template_needs_no_placeholder() {
        assert!(request(&["write a greeting"]).validate().unwrap().is_empty());
    }
}
