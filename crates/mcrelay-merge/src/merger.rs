//! Orchestrates region-key discovery and the load/merge/write pass over a
//! set of `.mcr`/`.maplog` inputs.

use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use mcrelay_region::RegionFile;

use crate::error::Result;
use crate::input::{is_zip_container, overlaps, parse_name, InputLocation, Kind};

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub output_dir: PathBuf,
    /// World-space `(x0, z0, x1, z1)`; regions whose extent does not
    /// overlap are dropped before any file is opened.
    pub target_bbox: Option<(i32, i32, i32, i32)>,
    /// World-space `(dx, dz)`; each output region coordinate is shifted by
    /// its own floor-divided component, independent of the other.
    pub origin_shift: Option<(i32, i32)>,
    pub force: bool,
}

/// Indexes input files by region coordinate and runs the merge pass
/// described in the region-merger component: one `.mcr` and no `.maplog`
/// inputs for a key copy straight through; anything else loads every
/// `.mcr` (later wins per chunk), then applies every `.maplog` (later wins
/// per cell), then writes the result.
pub struct RegionMerger {
    options: MergeOptions,
    regions: BTreeSet<(i32, i32)>,
    mcrs: HashMap<(i32, i32), Vec<InputLocation>>,
    maplogs: HashMap<(i32, i32), Vec<InputLocation>>,
}

impl RegionMerger {
    #[must_use]
    pub fn new(options: MergeOptions) -> Self {
        Self { options, regions: BTreeSet::new(), mcrs: HashMap::new(), maplogs: HashMap::new() }
    }

    /// Adds one input path: a zip container is expanded into its matching
    /// entries, anything else is treated as a loose file.
    pub fn add_path(&mut self, path: &Path) -> Result<()> {
        if is_zip_container(path) {
            self.add_zip_container(path)
        } else {
            self.add_loose(path);
            Ok(())
        }
    }

    fn add_loose(&mut self, path: &Path) {
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else { return };
        self.register(name, InputLocation::Loose(path.to_path_buf()));
    }

    fn add_zip_container(&mut self, container: &Path) -> Result<()> {
        let file = std::fs::File::open(container)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            entries.push(entry.name().to_string());
        }
        for entry_name in entries {
            let Some(basename) = Path::new(&entry_name).file_name().and_then(|s| s.to_str()) else { continue };
            let basename = basename.to_string();
            self.register(&basename, InputLocation::Zipped { container: container.to_path_buf(), entry: entry_name });
        }
        Ok(())
    }

    fn register(&mut self, name: &str, location: InputLocation) {
        let Some((rx, rz, kind)) = parse_name(name) else {
            tracing::warn!("unknown file format: {name}");
            return;
        };
        if let Some(bbox) = self.options.target_bbox {
            let extent = (rx * 512, rz * 512, rx * 512 + 512, rz * 512 + 512);
            if !overlaps(bbox, extent) {
                tracing::debug!("region ({rx}, {rz}) outside target bbox, skipping");
                return;
            }
        }
        self.regions.insert((rx, rz));
        match kind {
            Kind::Mcr => self.mcrs.entry((rx, rz)).or_default().push(location),
            Kind::Maplog => self.maplogs.entry((rx, rz)).or_default().push(location),
        }
    }

    /// Runs the merge pass over every registered region key, returning the
    /// output paths actually written (a skipped pre-existing output is not
    /// included).
    pub fn run(&self) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.options.output_dir)?;
        let total = self.regions.len();
        let mut written = Vec::new();
        for (i, &(rx, rz)) in self.regions.iter().enumerate() {
            tracing::info!("merging region ({rx}, {rz}) [{}/{total}]", i + 1);
            if let Some(path) = self.merge_one(rx, rz)? {
                written.push(path);
            }
        }
        Ok(written)
    }

    fn output_path(&self, rx: i32, rz: i32) -> PathBuf {
        let (orx, orz) = match self.options.origin_shift {
            Some((dx, dz)) => (rx - dx.div_euclid(512), rz - dz.div_euclid(512)),
            None => (rx, rz),
        };
        self.options.output_dir.join(format!("r.{orx}.{orz}.mcr"))
    }

    fn merge_one(&self, rx: i32, rz: i32) -> Result<Option<PathBuf>> {
        let no_inputs: Vec<InputLocation> = Vec::new();
        let mcrs = self.mcrs.get(&(rx, rz)).unwrap_or(&no_inputs);
        let maplogs = self.maplogs.get(&(rx, rz)).unwrap_or(&no_inputs);
        let output_path = self.output_path(rx, rz);

        if maplogs.is_empty() && mcrs.len() == 1 {
            if output_path.exists() && !self.options.force {
                tracing::info!("{} exists, skipping", output_path.display());
                return Ok(None);
            }
            let bytes = mcrs[0].read_bytes()?;
            std::fs::write(&output_path, bytes)?;
            return Ok(Some(output_path));
        }

        let mut region = RegionFile::new(rx, rz);
        for loc in mcrs {
            match loc.read_bytes() {
                Ok(bytes) => match RegionFile::load_mcr(rx, rz, &mut Cursor::new(bytes)) {
                    Ok(loaded) => region.merge_from(loaded),
                    Err(err) => tracing::warn!("failed to parse mcr input {}: {err}", loc.display()),
                },
                Err(err) => tracing::warn!("failed to read mcr input {}: {err}", loc.display()),
            }
        }
        for loc in maplogs {
            match loc.read_bytes() {
                Ok(bytes) => {
                    if let Err(err) = region.load_log(&mut Cursor::new(bytes)) {
                        tracing::warn!("failed to apply maplog input {}: {err}", loc.display());
                    }
                }
                Err(err) => tracing::warn!("failed to read maplog input {}: {err}", loc.display()),
            }
        }

        if output_path.exists() {
            let mut old_name = output_path.file_name().expect("output path always has a file name").to_os_string();
            old_name.push(".old");
            let old_path = output_path.with_file_name(old_name);
            std::fs::rename(&output_path, &old_path)?;
            tracing::info!("renamed {} -> {}", output_path.display(), old_path.display());
        }
        let mut file = std::fs::File::create(&output_path)?;
        region.write(&mut file)?;
        Ok(Some(output_path))
    }
}
