use clap::Parser;
use jxl_frame_dump::Args;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> std::process::ExitCode {
    let Args { decode, globals } = Args::parse();

    if !globals.quiet {
        let filter = match globals.verbose {
            0 => tracing::level_filters::LevelFilter::INFO,
            1 => tracing::level_filters::LevelFilter::DEBUG,
            2.. => tracing::level_filters::LevelFilter::TRACE,
        };
        let env_filter = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(filter.into())
            .from_env_lossy();
        tracing_subscriber::fmt()
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::ACTIVE)
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match jxl_frame_dump::decode::handle_decode(decode) {
        Ok(_) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            if globals.quiet {
                eprintln!("{e}");
            } else {
                tracing::error!("{e}");
            }
            std::process::ExitCode::from(e.kind().exit_code())
        }
    }
}
