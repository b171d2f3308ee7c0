//! Locating and reading `r.<rx>.<rz>.(mcr|maplog)` files, loose or inside a
//! zip container.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^r\.(-?\d+)\.(-?\d+)\.(mcr|maplog)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Mcr,
    Maplog,
}

/// Parses a bare file name (no directory components) into its region
/// coordinate and kind, per the `r.<rx>.<rz>.(mcr|maplog)` naming
/// convention. Case-insensitive, matching the source tool's pattern.
pub fn parse_name(name: &str) -> Option<(i32, i32, Kind)> {
    let caps = NAME_PATTERN.captures(name)?;
    let rx = caps[1].parse().ok()?;
    let rz = caps[2].parse().ok()?;
    let kind = if caps[3].eq_ignore_ascii_case("mcr") { Kind::Mcr } else { Kind::Maplog };
    Some((rx, rz, kind))
}

/// One input file, either a loose path or a named entry inside a zip
/// container. A container is opened and fully buffered per read, since zip
/// entries here are not independently seekable.
#[derive(Debug, Clone)]
pub enum InputLocation {
    Loose(PathBuf),
    Zipped { container: PathBuf, entry: String },
}

impl InputLocation {
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Loose(path) => Ok(std::fs::read(path)?),
            Self::Zipped { container, entry } => {
                let file = std::fs::File::open(container)?;
                let mut archive = zip::ZipArchive::new(file)?;
                let mut zip_file = archive.by_name(entry)?;
                let mut buf = Vec::new();
                std::io::Read::read_to_end(&mut zip_file, &mut buf)?;
                Ok(buf)
            }
        }
    }

    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Loose(path) => path.display().to_string(),
            Self::Zipped { container, entry } => format!("{}:{entry}", container.display()),
        }
    }
}

/// Whether two half-open axis-aligned boxes `(x0, z0, x1, z1)` overlap.
#[must_use]
pub fn overlaps(a: (i32, i32, i32, i32), b: (i32, i32, i32, i32)) -> bool {
    !(a.2 <= b.0 || b.2 <= a.0 || a.3 <= b.1 || b.3 <= a.1)
}

/// Whether `path` should be treated as a zip container, by extension.
#[must_use]
pub fn is_zip_container(path: &Path) -> bool {
    path.extension().and_then(std::ffi::OsStr::to_str).is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}
