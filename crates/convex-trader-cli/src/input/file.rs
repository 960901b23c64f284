use serde::de::DeserializeOwned;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use super::parse_json;

/// Read a JSON file into a typed input.
pub fn read_json<T: DeserializeOwned>(path: &str, what: &str) -> Result<T, Box<dyn Error>> {
    let resolved = resolve_path(path)?;
    let contents = fs::read_to_string(&resolved)
        .map_err(|e| format!("Failed to read '{}': {}", resolved.display(), e))?;
    parse_json(&contents, what, &format!("'{}'", resolved.display()))
}

fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn Error>> {
    let p = Path::new(path);
    let resolved = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };
    if !resolved.is_file() {
        let problem = if resolved.exists() { "Not a file" } else { "File not found" };
        return Err(format!("{}: {}", problem, resolved.display()).into());
    }
    Ok(resolved)
}
