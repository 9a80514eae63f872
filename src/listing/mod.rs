mod fetch;
mod parse;

pub use fetch::{list_files, list_subdirectories};
pub use parse::{RemoteEntry, SubdirLink, parse_file_entries, parse_subdirectories};
