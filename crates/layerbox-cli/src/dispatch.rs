use std::sync::Arc;

use layerbox_core::{
    open_sandbox, outcome_from_error, CommandContext, Config, ExecutionOutcome, GlobalOptions,
    SandboxRequest, SharedEffects, SystemEffects,
};
use tracing::debug;

use crate::cli::LayerboxCli;
use crate::style::Style;
use crate::terminal::{TerminalPrompter, TerminalReporter};

pub fn sandbox_request(cli: &LayerboxCli) -> SandboxRequest {
    SandboxRequest {
        source: cli.image_source.into(),
        choose: cli.choose,
        image: cli.image.clone(),
        platform: cli.platform.map(Into::into),
        dry_run: cli.dry_run,
        no_input: cli.no_input,
    }
}

/// Runs one invocation; every failure comes back as an outcome.
pub fn dispatch(global: &GlobalOptions, request: &SandboxRequest) -> ExecutionOutcome {
    let style = Style::new(global.no_color, atty::is(atty::Stream::Stderr));
    core_call(|| {
        let effects: SharedEffects = Arc::new(SystemEffects::new(&Config::from_env())?);
        let ctx = CommandContext::new(global, effects)?;
        let prompter = TerminalPrompter::new(&style);
        let reporter = TerminalReporter::new(&style, !(global.quiet || global.json));
        open_sandbox(&ctx, request, &prompter, &reporter)
    })
}

fn core_call<F>(action: F) -> ExecutionOutcome
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => outcome,
        Err(err) => {
            debug!(error = %format!("{err:#}"), "invocation failed");
            outcome_from_error(&err)
        }
    }
}
