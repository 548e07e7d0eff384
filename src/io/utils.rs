//! Utilities for writing serialized data.

#[cfg(feature = "serialization")]
use serde::Serialize;
#[cfg(feature = "serialization")]
use std::{fs, io, path::Path};

/// Serializes the given data into JSON format and saves it at the given path.
#[cfg(feature = "json")]
pub fn save_data_as_json<P: AsRef<Path>, T: Serialize>(file_path: P, data: &T) -> io::Result<()> {
    let file = fs::File::create(file_path)?;
    write_data_as_json(&mut io::BufWriter::new(file), data)
}

/// Serializes the given data into JSON format and writes it to the given writer.
#[cfg(feature = "json")]
pub fn write_data_as_json<T: Serialize, W: io::Write>(writer: &mut W, data: &T) -> io::Result<()> {
    serde_json::to_writer(writer, data).map_err(io::Error::from)
}

/// Serializes the given data into protocol 3 pickle format and saves it at the given path.
#[cfg(feature = "pickle")]
pub fn save_data_as_pickle<P: AsRef<Path>, T: Serialize>(file_path: P, data: &T) -> io::Result<()> {
    let file = fs::File::create(file_path)?;
    write_data_as_pickle(&mut io::BufWriter::new(file), data)
}

/// Serializes the given data into protocol 3 pickle format and writes it to the given writer.
#[cfg(feature = "pickle")]
pub fn write_data_as_pickle<T: Serialize, W: io::Write>(writer: &mut W, data: &T) -> io::Result<()> {
    match serde_pickle::to_writer(writer, data, serde_pickle::SerOptions::new()) {
        Ok(_) => Ok(()),
        Err(serde_pickle::Error::Io(err)) => Err(err),
        Err(err) => Err(io::Error::new(io::ErrorKind::Other, err.to_string())),
    }
}
