//! Struct archiving functionality
//!
//! To add archiving functionality to a struct implement the `Archived` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::Path;
use thiserror::Error;

pub use csv::Writer;

use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
///
/// Records must be flat structs, the `csv` writer can't serialise nested structs or maps.
#[derive(Debug)]
pub struct Archiver {
    writer: Writer<File>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file: {0}")]
    CreateError(std::io::Error),

    #[error("Cannot write the archive record: {0}")]
    WriteError(csv::Error),

    #[error("Cannot flush the archive: {0}")]
    FlushError(std::io::Error),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A trait which enables a struct to be archived as a timestamped csv.
///
/// Implementors hold their `Archiver`s (created during `init`) and write one record per cycle.
pub trait Archived {
    /// Write the archives for this struct
    fn write(&mut self) -> Result<(), ArchiveError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's archive root.
    ///
    /// Any missing parent directories are created and an existing file is truncated.
    pub fn from_path<P: AsRef<Path>>(session: &Session, path: P) -> Result<Self, ArchiveError> {
        let arch_path = session.arch_root.join(path);

        if let Some(parent) = arch_path.parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::CreateError)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(arch_path)
            .map_err(ArchiveError::CreateError)?;

        let writer = WriterBuilder::new().has_headers(true).from_writer(file);

        Ok(Self { writer })
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        self.writer
            .serialize(record)
            .map_err(ArchiveError::WriteError)?;
        self.writer.flush().map_err(ArchiveError::FlushError)
    }
}
