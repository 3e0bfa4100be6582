pub mod decode;

pub use decode::DecodeArgs;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Args {
    #[command(flatten)]
    pub decode: DecodeArgs,
    #[command(flatten)]
    pub globals: GlobalArgs,
}

#[derive(Debug, clap::Args)]
#[non_exhaustive]
pub struct GlobalArgs {
    /// Print debug information; can be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Do not print logs to console.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
