//! Answer region queries against a persisted warden state file.
//!
//! ```text
//! warden-inspect state.json resolve overworld 10 64 -3 can_break
//! ```
//!
//! Results are printed as JSON. Set `RUST_LOG` for more detail.

use tracing::debug;
use warden_inspect::{USAGE, open, parse_args, run};

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("warden_inspect=info".parse()?)
                .add_directive("warden_engine=warn".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("{USAGE}");
        return Ok(());
    }

    let invocation = match parse_args(args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{USAGE}");
            return Err(e);
        }
    };
    debug!(?invocation, "parsed arguments");

    let engine = open(&invocation.state, invocation.config.as_deref())?;
    let out = run(&engine, &invocation.command)?;
    println!("{}", serde_json::to_string_pretty(&out)?);

    engine.shutdown();
    Ok(())
}
