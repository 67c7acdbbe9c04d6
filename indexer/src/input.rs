use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One source document as stored in `.json` / `.jsonl` input files.
#[derive(Debug, Deserialize)]
pub struct InputDoc {
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default)]
    pub classes: Vec<String>,
    pub body: String,
}

/// Input files under `path`, in a stable order.
pub fn input_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect();
    files.sort();
    files
}

pub fn read_file(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("opening {}", file.display()))?,
    );
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        return read_jsonl(reader, file);
    }

    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(|v| serde_json::from_value::<InputDoc>(v).map_err(anyhow::Error::from))
            .collect(),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(json)?]),
        _ => {
            tracing::warn!(file = %file.display(), "ignoring JSON that is neither object nor array");
            Ok(Vec::new())
        }
    }
}

fn read_jsonl<R: BufRead>(reader: R, file: &Path) -> Result<Vec<InputDoc>> {
    let mut docs = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), line_no + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}
