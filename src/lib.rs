pub mod config;
pub mod dts;
pub mod error;
pub mod generate;
pub mod layout;
pub mod logging;
pub mod parse_file;
pub mod sources;
pub mod strings;
pub mod template;
