use std::path::Path;

use cultstat_core::Config;
use serde_json::json;
use tracing::info;

use crate::cli::{Cli, TrackedArgs, TrackedCommand};
use crate::error::CliError;

use super::CommandResult;

/// Edits the file in place; the environment is never written back.
pub fn run(cli: &Cli, args: &TrackedArgs) -> Result<CommandResult, CliError> {
    let path = cli.config.as_path();
    let mut config = Config::read_unvalidated(path)?;

    let action = match &args.command {
        TrackedCommand::List => "list",
        TrackedCommand::Add { identifier } => {
            let slug = config.add_tracked(identifier)?;
            save(&config, path)?;
            info!(slug = %slug, "tracked creation added");
            "added"
        }
        TrackedCommand::Remove { identifier } => {
            let slug = config.remove_tracked(identifier)?;
            save(&config, path)?;
            info!(slug = %slug, "tracked creation removed");
            "removed"
        }
    };

    let tracked = config.tracked()?;
    Ok(CommandResult::ok(json!({
        "action": action,
        "config": path.display().to_string(),
        "tracked_creations": tracked.iter().map(|slug| slug.as_str()).collect::<Vec<_>>(),
    })))
}

fn save(config: &Config, path: &Path) -> Result<(), CliError> {
    config.save(path)?;
    Ok(())
}
