//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; a single route table dispatches to the control surface.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{exit_code, map_error};
pub use parse::{
    Cli, Commands, ConfigCommands, DialogCommands, FeedbackCommands, GeneratorCommands,
    JobCommands,
};
pub use presentation::status_label;
pub use route::RunContext;
