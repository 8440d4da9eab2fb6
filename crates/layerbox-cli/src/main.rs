use clap::Parser;
use color_eyre::Result;
use layerbox_core::GlobalOptions;

mod cli;
mod dispatch;
mod output;
mod style;
mod terminal;

use cli::LayerboxCli;
use output::{emit_output, OutputOptions};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = LayerboxCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let global = GlobalOptions {
        quiet: cli.quiet,
        json: cli.json,
        no_color: cli.no_color,
    };
    let request = dispatch::sandbox_request(&cli);
    let outcome = dispatch::dispatch(&global, &request);
    let code = emit_output(
        &OutputOptions {
            quiet: cli.quiet,
            json: cli.json,
            no_color: cli.no_color,
        },
        &outcome,
    )?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!(
        "layerbox={level},layerbox_cli={level},layerbox_core={level},layerbox_domain={level}"
    );
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
