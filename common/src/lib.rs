#[macro_use]
pub mod macros;
pub mod file_format;
pub mod key_index_vec;
pub mod log_setup;
pub mod serde_format;

pub use file_format::{FileExtensionError, FileFormat, FileFormatResult};
pub use serde_format::{deserialize, deserialize_file, serialize, SerdeFormatError, SerdeFormatResult};

pub fn is_debug() -> bool {
    cfg!(debug_assertions)
}
