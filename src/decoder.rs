//! Custom vibration file decoding.
//!
//! A custom vibration is a JSON document embedded in a larger file at
//! `offset`/`length`:
//!
//! ```json
//! { "patterns": [ { "startTime": 0, "events": [
//!     { "type": "continuous", "startTime": 0, "duration": 200, "intensity": 50, "frequency": 0,
//!       "points": [ { "time": 0, "intensity": 0, "frequency": 0 }, ... ] },
//!     { "type": "transient", "startTime": 300, "intensity": 75, "frequency": 53 }
//! ] } ] }
//! ```

use crate::error::{Result, VibratorError};
use crate::pattern::VibratorPackage;
use std::io::{Read, Seek, SeekFrom};

/// Upper bound on an embedded vibration document.
pub const MAX_DOCUMENT_SIZE: u64 = 1024 * 1024;

/// Decode the document found at `offset`/`length` inside `reader`.
pub fn decode_at<R: Read + Seek>(reader: &mut R, offset: u64, length: u64) -> Result<VibratorPackage> {
    if length == 0 || length > MAX_DOCUMENT_SIZE {
        return Err(VibratorError::Parameter(format!("invalid vibration file length: {length}")));
    }
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(|e| VibratorError::Decode(format!("seek to {offset} failed: {e}")))?;
    let mut buf = Vec::with_capacity(length as usize);
    reader
        .take(length)
        .read_to_end(&mut buf)
        .map_err(|e| VibratorError::Decode(format!("read failed: {e}")))?;
    if (buf.len() as u64) < length {
        return Err(VibratorError::Decode(format!(
            "file truncated: wanted {length} bytes at {offset}, got {}",
            buf.len()
        )));
    }
    decode_slice(&buf)
}

/// Decode a whole file.
pub fn decode_file(path: &std::path::Path) -> Result<VibratorPackage> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| VibratorError::Decode(format!("open {} failed: {e}", path.display())))?;
    let length = file
        .metadata()
        .map_err(|e| VibratorError::Decode(format!("stat {} failed: {e}", path.display())))?
        .len();
    decode_at(&mut file, 0, length)
}

pub fn decode_slice(bytes: &[u8]) -> Result<VibratorPackage> {
    let package: VibratorPackage =
        serde_json::from_slice(bytes).map_err(|e| VibratorError::Decode(e.to_string()))?;
    package.validate()?;
    log::debug!("Decoded vibration package with {} pattern(s)", package.patterns.len());
    Ok(package)
}
