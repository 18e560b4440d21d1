//! # Parameter and sensitivity files
//!
//! Both files are whitespace-separated text with one unknown per line:
//!
//! - unknown parameters: `TYPE latitude longitude radius weighting`
//! - sensitivities: `TYPE latitude longitude radius sensitivity`
//!
//! Blank lines and lines starting with `#` are skipped. Sensitivities are
//! matched to unknowns by position, never by looking up the location, so the
//! two files must list the unknowns in the same order.

use crate::types::{Location, PhysicalType, UnknownParameter, UnknownPhysicalType};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A comprehensive error type for reading unknown-parameter and sensitivity files.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{}:{line}: expected 5 whitespace-separated fields (type, latitude, longitude, radius, {value_name}), found {found}.",
        .path.display()
    )]
    FieldCount {
        path: PathBuf,
        line: usize,
        value_name: &'static str,
        found: usize,
    },

    #[error("{}:{line}: {source}", .path.display())]
    UnknownType {
        path: PathBuf,
        line: usize,
        #[source]
        source: UnknownPhysicalType,
    },

    #[error("{}:{line}: the {field} field '{text}' is not a finite number.", .path.display())]
    InvalidNumber {
        path: PathBuf,
        line: usize,
        field: &'static str,
        text: String,
    },

    #[error("{}:{line}: weighting must be positive, but was {value}.", .path.display())]
    NonPositiveWeighting {
        path: PathBuf,
        line: usize,
        value: f64,
    },

    #[error("The sensitivity file lists {found} entries, but there are {expected} unknown parameters.")]
    SensitivityCount { found: usize, expected: usize },

    #[error(
        "Sensitivity entry {index} is for {found} at ({found_location}), but unknown parameter {index} is {expected} at ({expected_location})."
    )]
    SensitivityMismatch {
        index: usize,
        expected: PhysicalType,
        expected_location: Location,
        found: PhysicalType,
        found_location: Location,
    },
}

/// One line of a sensitivity file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensitivityRecord {
    pub physical_type: PhysicalType,
    pub location: Location,
    pub sensitivity: f64,
}

struct LineRecord {
    line: usize,
    physical_type: PhysicalType,
    location: Location,
    value: f64,
}

fn read_records(path: &Path, value_name: &'static str) -> Result<Vec<LineRecord>, FileError> {
    let io_error = |source| FileError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_error)?);

    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error)?;
        let line_number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(FileError::FieldCount {
                path: path.to_path_buf(),
                line: line_number,
                value_name,
                found: fields.len(),
            });
        }
        let physical_type =
            fields[0]
                .parse::<PhysicalType>()
                .map_err(|source| FileError::UnknownType {
                    path: path.to_path_buf(),
                    line: line_number,
                    source,
                })?;
        let number = |position: usize, field: &'static str| -> Result<f64, FileError> {
            fields[position]
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| FileError::InvalidNumber {
                    path: path.to_path_buf(),
                    line: line_number,
                    field,
                    text: fields[position].to_string(),
                })
        };
        let location = Location::new(
            number(1, "latitude")?,
            number(2, "longitude")?,
            number(3, "radius")?,
        );
        let value = number(4, value_name)?;
        records.push(LineRecord {
            line: line_number,
            physical_type,
            location,
            value,
        });
    }
    Ok(records)
}

/// Reads an unknown-parameter file, preserving line order.
///
/// Duplicated unknowns (same type and location) are reported with a warning
/// but kept, because dropping one would shift every later index.
pub fn read_unknown_parameters(path: &Path) -> Result<Vec<UnknownParameter>, FileError> {
    let records = read_records(path, "weighting")?;
    let mut parameters = Vec::with_capacity(records.len());
    for record in records {
        let parameter = UnknownParameter::new(record.physical_type, record.location, record.value)
            .map_err(|_| FileError::NonPositiveWeighting {
                path: path.to_path_buf(),
                line: record.line,
                value: record.value,
            })?;
        parameters.push(parameter);
    }

    for i in 0..parameters.len() {
        for j in (i + 1)..parameters.len() {
            if parameters[i].same_unknown(&parameters[j]) {
                log::warn!(
                    "Unknown parameters {} and {} in {} are duplicates ({}); the covariance matrix will be singular.",
                    i,
                    j,
                    path.display(),
                    parameters[i]
                );
            }
        }
    }

    log::info!(
        "Read {} unknown parameters from {}",
        parameters.len(),
        path.display()
    );
    Ok(parameters)
}

/// Reads a sensitivity file, preserving line order.
pub fn read_sensitivity_file(path: &Path) -> Result<Vec<SensitivityRecord>, FileError> {
    let records = read_records(path, "sensitivity")?;
    log::info!("Read {} sensitivities from {}", records.len(), path.display());
    Ok(records
        .into_iter()
        .map(|r| SensitivityRecord {
            physical_type: r.physical_type,
            location: r.location,
            sensitivity: r.value,
        })
        .collect())
}

/// Extracts the sensitivity values in parameter order, checking that entry
/// `i` refers to the same physical type and location as unknown `i`.
pub fn align_sensitivities(
    records: &[SensitivityRecord],
    parameters: &[UnknownParameter],
) -> Result<Vec<f64>, FileError> {
    if records.len() != parameters.len() {
        return Err(FileError::SensitivityCount {
            found: records.len(),
            expected: parameters.len(),
        });
    }
    records
        .iter()
        .zip(parameters)
        .enumerate()
        .map(|(index, (record, parameter))| {
            if record.physical_type != parameter.physical_type()
                || record.location != *parameter.location()
            {
                return Err(FileError::SensitivityMismatch {
                    index,
                    expected: parameter.physical_type(),
                    expected_location: *parameter.location(),
                    found: record.physical_type,
                    found_location: record.location,
                });
            }
            Ok(record.sensitivity)
        })
        .collect()
}
