pub mod prompts;
pub mod providers;
pub mod response_parser;

pub use response_parser::{ResponseParser, parse_reviewer_json, parse_reviewer_object};
