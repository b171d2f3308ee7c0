//! CLI entry point for the offline region merger: combines loose or zipped
//! `r.<rx>.<rz>.(mcr|maplog)` inputs into one `.mcr` per region. See
//! `mcrelay-merge` for the indexing and merge-policy implementation.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use mcrelay_merge::{MergeOptions, RegionMerger};

/// Merges region files and `maplog` chunk-patch captures produced by
/// `relay-proxy` into a server's on-disk region storage.
#[derive(Parser)]
#[command(name = "relay-regionmerge")]
struct Args {
    /// Directory to write merged `r.<rx>.<rz>.mcr` files into.
    #[arg(short = 'o', long = "output-dir", default_value = "./region")]
    output_dir: PathBuf,

    /// World-space bounding box `x0,z0,x1,z1`; regions outside it are
    /// dropped before any input file is opened.
    #[arg(short = 't', long = "target-bbox", value_name = "x0,z0,x1,z1")]
    target_bbox: Option<String>,

    /// World-space origin shift `dx,dz` applied to output region
    /// coordinates, each axis divided by its own component.
    #[arg(short = 'S', long = "origin-shift", value_name = "dx,dz")]
    origin_shift: Option<String>,

    /// Overwrite an existing output file instead of skipping the
    /// verbatim-copy fast path.
    #[arg(short = 'f', long)]
    force: bool,

    /// Loose file paths or glob patterns (`*`, `?`); `.zip` containers are
    /// read as archives of loose files.
    inputs: Vec<String>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err)
            if err.kind() == clap::error::ErrorKind::DisplayHelp
                || err.kind() == clap::error::ErrorKind::DisplayVersion =>
        {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(100);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::new("info")).init();

    let target_bbox = args.target_bbox.as_deref().map(parse_quad).transpose().context("invalid --target-bbox")?;
    let origin_shift = args.origin_shift.as_deref().map(parse_pair).transpose().context("invalid --origin-shift")?;

    if args.inputs.is_empty() {
        bail!("no input files given");
    }

    let options =
        MergeOptions { output_dir: args.output_dir, target_bbox, origin_shift, force: args.force };
    let mut merger = RegionMerger::new(options);

    for pattern in &args.inputs {
        for path in expand_glob(pattern) {
            merger.add_path(&path).with_context(|| format!("failed to read {}", path.display()))?;
        }
    }

    let written = merger.run().context("merge pass failed")?;
    for path in &written {
        tracing::info!("wrote {}", path.display());
    }
    Ok(())
}

fn parse_quad(text: &str) -> anyhow::Result<(i32, i32, i32, i32)> {
    let parts: Vec<i32> = text.split(',').map(str::trim).map(str::parse).collect::<Result<_, _>>()?;
    let [x0, z0, x1, z1]: [i32; 4] = parts.try_into().map_err(|_| anyhow::anyhow!("expected 4 comma-separated integers, got {text}"))?;
    Ok((x0, z0, x1, z1))
}

fn parse_pair(text: &str) -> anyhow::Result<(i32, i32)> {
    let parts: Vec<i32> = text.split(',').map(str::trim).map(str::parse).collect::<Result<_, _>>()?;
    let [dx, dz]: [i32; 2] = parts.try_into().map_err(|_| anyhow::anyhow!("expected 2 comma-separated integers, got {text}"))?;
    Ok((dx, dz))
}

/// Expands one positional argument. Patterns without `*`/`?` are returned
/// as-is (a plain path, or a shell-expanded argument on platforms that do
/// that themselves); anything else is matched against the entries of its
/// parent directory with a small single-component `fnmatch`.
fn expand_glob(pattern: &str) -> Vec<PathBuf> {
    if !pattern.contains('*') && !pattern.contains('?') {
        return vec![PathBuf::from(pattern)];
    }

    let path = Path::new(pattern);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let Some(name_pattern) = path.file_name().and_then(|s| s.to_str()) else {
        return Vec::new();
    };

    let Ok(entries) = std::fs::read_dir(dir) else { return Vec::new() };
    let mut matches: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.file_name().and_then(|s| s.to_str()).is_some_and(|name| fnmatch(name_pattern, name)))
        .collect();
    matches.sort();
    matches
}

/// Matches `name` against a single-component glob `pattern` where `*`
/// matches any run of characters and `?` matches exactly one.
fn fnmatch(pattern: &str, name: &str) -> bool {
    fn go(pattern: &[u8], name: &[u8]) -> bool {
        match (pattern.first(), name.first()) {
            (None, None) => true,
            (Some(b'*'), _) => go(&pattern[1..], name) || (!name.is_empty() && go(pattern, &name[1..])),
            (Some(b'?'), Some(_)) => go(&pattern[1..], &name[1..]),
            (Some(p), Some(n)) if p == n => go(&pattern[1..], &name[1..]),
            _ => false,
        }
    }
    go(pattern.as_bytes(), name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::{fnmatch, parse_pair, parse_quad};

    #[test]
    fn fnmatch_handles_star_and_question_mark() {
        assert!(fnmatch("r.*.mcr", "r.0.0.mcr"));
        assert!(fnmatch("r.?.?.mcr", "r.1.2.mcr"));
        assert!(!fnmatch("r.?.?.mcr", "r.10.2.mcr"));
        assert!(!fnmatch("*.maplog", "r.0.0.mcr"));
    }

    #[test]
    fn parses_comma_separated_integer_tuples() {
        assert_eq!(parse_quad("0,0,512,512").unwrap(), (0, 0, 512, 512));
        assert_eq!(parse_pair("-512,0").unwrap(), (-512, 0));
        assert!(parse_quad("0,0,512").is_err());
    }
}
