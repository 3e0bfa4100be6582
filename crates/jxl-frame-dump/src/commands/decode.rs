use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
#[non_exhaustive]
pub struct DecodeArgs {
    /// Input file
    #[arg(default_value = "test.jxl")]
    pub input: PathBuf,
    /// Directory to write frames into, named `00.png`, `01.png` and so on
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Number of bytes read from the input at a time
    #[arg(long, default_value = "1024")]
    pub chunk_size: NonZeroUsize,
    /// Number of parallelism to use
    #[cfg(feature = "rayon")]
    #[arg(short = 'j', long)]
    pub num_threads: Option<usize>,
}
