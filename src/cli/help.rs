//! CLI command-name contract used in logs.

use crate::cli::parse::{
    Commands, ConfigCommands, DialogCommands, FeedbackCommands, GeneratorCommands, JobCommands,
};

/// Command name string for logging (e.g. "job.start", "dialog.list").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Generator { command } => format!("generator.{}", generator_command_name(command)),
        Commands::Job { command } => format!("job.{}", job_command_name(command)),
        Commands::Dialog { command } => format!("dialog.{}", dialog_command_name(command)),
        Commands::Feedback { command } => format!("feedback.{}", feedback_command_name(command)),
        Commands::Config { command } => format!("config.{}", config_command_name(command)),
    }
}

pub fn generator_command_name(command: &GeneratorCommands) -> &'static str {
    match command {
        GeneratorCommands::Add { .. } => "add",
        GeneratorCommands::Show { .. } => "show",
        GeneratorCommands::List { .. } => "list",
    }
}

pub fn job_command_name(command: &JobCommands) -> &'static str {
    match command {
        JobCommands::Create { .. } => "create",
        JobCommands::Start { .. } => "start",
        JobCommands::Retry { .. } => "retry",
        JobCommands::Stop { .. } => "stop",
        JobCommands::List { .. } => "list",
        JobCommands::Show { .. } => "show",
    }
}

pub fn dialog_command_name(command: &DialogCommands) -> &'static str {
    match command {
        DialogCommands::List { .. } => "list",
        DialogCommands::Edit { .. } => "edit",
        DialogCommands::Status { .. } => "status",
    }
}

pub fn feedback_command_name(command: &FeedbackCommands) -> &'static str {
    match command {
        FeedbackCommands::Add { .. } => "add",
        FeedbackCommands::List { .. } => "list",
    }
}

pub fn config_command_name(command: &ConfigCommands) -> &'static str {
    match command {
        ConfigCommands::Show => "show",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!(
            command_name(&Commands::Job {
                command: JobCommands::Start { id: 1 }
            }),
            "job.start"
        );
        assert_eq!(
            command_name(&Commands::Config {
                command: ConfigCommands::Show
            }),
            "config.show"
        );
    }
}
