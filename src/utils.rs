use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Inserts a line break every `every` characters.
pub fn insert_newlines(input: &str, every: usize) -> String {
    if every == 0 {
        return input.to_string();
    }
    let chars: Vec<char> = input.chars().collect();
    chars
        .chunks(every)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Spreadsheet formula that renders the image at `url` inside the cell.
pub fn image_formula(url: &str) -> String {
    format!("=IMAGE(\"{url}\")")
}

pub async fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(format!("{line}\n").as_bytes()).await?;
    Ok(())
}
