pub mod json_loader;

pub use json_loader::{list_subdirectories, load_json, load_json_or_default, save_json};
