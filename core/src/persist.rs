//! Snapshot persistence: bincode wrapped in a brotli stream.
//!
//! A snapshot holds both dictionaries, the document table and both posting
//! arenas. Centroids are written to a separate model file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::index::TotalIndex;

const BUFFER_SIZE: usize = 4096;
const QUALITY: u32 = 9;
const LG_WINDOW: u32 = 22;

fn write_compressed<T: Serialize, W: Write>(value: &T, writer: W) -> Result<W> {
    let mut encoder = brotli::CompressorWriter::new(writer, BUFFER_SIZE, QUALITY, LG_WINDOW);
    bincode::serialize_into(&mut encoder, value)?;
    encoder.flush()?;
    let mut writer = encoder.into_inner();
    writer.flush()?;
    Ok(writer)
}

/// Decompresses the whole stream before decoding. The slice decoder checks every
/// length prefix against the bytes actually present.
fn read_compressed<T: DeserializeOwned, R: Read>(reader: R) -> Result<T> {
    let mut decoder = brotli::Decompressor::new(reader, BUFFER_SIZE);
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(bincode::deserialize(&buf)?)
}

/// Writes to a sibling temporary file and renames it over `path`, so readers
/// never see a partial file.
fn write_file_atomically<T: Serialize>(value: &T, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temporary_path(path);
    let written = File::create(&tmp)
        .map(BufWriter::new)
        .map_err(IndexError::from)
        .and_then(|writer| write_compressed(value, writer))
        .and_then(|writer| writer.into_inner().map_err(|e| e.into_error().into()))
        .and_then(|file| {
            file.sync_all()?;
            Ok(file.metadata()?.len())
        });
    match written {
        Ok(bytes) => {
            fs::rename(&tmp, path)?;
            Ok(bytes)
        }
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            Err(err)
        }
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Encodes the whole index into `writer`.
pub fn serialise_to<W: Write>(index: &TotalIndex, writer: W) -> Result<()> {
    write_compressed(index, writer)?;
    Ok(())
}

/// Decodes a snapshot and checks its structure. Nothing is returned unless the
/// whole snapshot decodes and verifies.
pub fn deserialise_from<R: Read>(reader: R) -> Result<TotalIndex> {
    let index: TotalIndex = read_compressed(reader)?;
    index
        .verify()
        .map_err(|err| IndexError::input(format!("snapshot failed verification: {err}")))?;
    Ok(index)
}

pub fn serialise_to_file<P: AsRef<Path>>(index: &TotalIndex, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = write_file_atomically(index, path)?;
    tracing::info!(
        path = %path.display(),
        bytes,
        documents = index.document_count(),
        terms = index.term_count(),
        "wrote index snapshot"
    );
    Ok(())
}

pub fn deserialise_from_file<P: AsRef<Path>>(path: P) -> Result<TotalIndex> {
    let path = path.as_ref();
    let index = deserialise_from(BufReader::new(File::open(path)?))?;
    tracing::info!(
        path = %path.display(),
        documents = index.document_count(),
        terms = index.term_count(),
        "loaded index snapshot"
    );
    Ok(index)
}

pub fn save_centroids<P: AsRef<Path>>(centroids: &[Vec<f64>], path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = write_file_atomically(&centroids, path)?;
    tracing::info!(path = %path.display(), bytes, k = centroids.len(), "wrote centroids");
    Ok(())
}

pub fn load_centroids<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>> {
    let centroids: Vec<Vec<f64>> = read_compressed(BufReader::new(File::open(path)?))?;
    if let Some(first) = centroids.first() {
        if centroids.iter().any(|c| c.len() != first.len()) {
            return Err(IndexError::input("centroids have differing dimensions"));
        }
    }
    Ok(centroids)
}
