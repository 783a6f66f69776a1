pub mod output;

pub use output::{md_table, write_json_atomic, write_text_atomic, OutputFormat};
