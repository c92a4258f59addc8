use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use rv64vm::{run_vm, VMOpts};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Opts {
    /// Show executed instructions
    #[arg(short, long)]
    trace: bool,

    #[command(flatten)]
    vm: VMOpts,
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    let level = if opts.trace {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let regs = run_vm(&opts.vm)?;
    println!("{regs}");
    Ok(())
}
