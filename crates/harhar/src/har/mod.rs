//! HTTP archive (HAR 1.2) model and file I/O.
//!
//! # Module Structure
//!
//! - `model` - Archive, Entry, Request, Response and friends
//! - `file` - reading/writing archives (`-` = stdio)

mod file;
mod model;

pub use crate::name_value::NameValue;
pub use file::{parse_archive, read_archive, write_archive, STDIO_PATH};
pub use model::{
    Archive, Content, Cookie, Creator, Entry, Log, PostData, PostParam, Request, Response,
    Timings, CREATOR_NAME, DEFAULT_HTTP_VERSION, HAR_VERSION, UNKNOWN_MIME_TYPE,
};
