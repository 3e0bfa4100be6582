pub mod color;
pub mod commands;
pub mod decode;
pub mod decoder;
pub mod driver;
pub mod error;
pub mod frame;
pub mod input;
pub mod output;
pub mod oxide;

pub use commands::Args;
pub use error::Error;

type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "rayon")]
fn create_thread_pool(num_threads: Option<usize>) -> jxl_oxide::JxlThreadPool {
    jxl_oxide::JxlThreadPool::rayon(num_threads)
}

#[cfg(not(feature = "rayon"))]
fn create_thread_pool(_num_threads: Option<usize>) -> jxl_oxide::JxlThreadPool {
    jxl_oxide::JxlThreadPool::none()
}
