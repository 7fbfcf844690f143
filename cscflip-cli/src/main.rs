//! `cscflip`: transpose the normalized matrix of a `.zarr` store in place.

mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cscflip_core::Summarizable;
use cscflip_matrix::{check_complete, run, TransposeConfig, ZarrStore};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the `.zarr` store
    store: PathBuf,

    /// Number of windows per dimension; more windows use less memory
    #[arg(short, long, default_value = "10")]
    partitions: usize,

    /// Group holding the matrix to transpose
    #[arg(long, default_value = "normalizedT")]
    source: String,

    /// Group receiving the transpose
    #[arg(long, default_value = "normalized")]
    output: String,

    /// Raw-count companion of the source
    #[arg(long, default_value = "countsT")]
    raw: String,

    /// Destination of the replicated raw companion
    #[arg(long, default_value = "counts")]
    raw_output: String,

    /// Value written to every entry of the output feature type array
    #[arg(long, default_value = "RNA")]
    feature_type: String,

    /// Elements per chunk for new arrays and streamed copies
    #[arg(long, default_value = "1048576")]
    chunk_len: u64,

    /// Skip the structural validation of the source
    #[arg(long)]
    skip_validation: bool,

    /// Log-normalize the raw companion when the source group is missing
    #[arg(long)]
    normalize_from_raw: bool,

    /// Only check whether the output group is completely written
    #[arg(long)]
    check: bool,
}

impl Args {
    fn config(&self) -> TransposeConfig {
        TransposeConfig {
            partition_count: self.partitions,
            source: self.source.clone(),
            output: self.output.clone(),
            raw: self.raw.clone(),
            raw_output: self.raw_output.clone(),
            feature_type: self.feature_type.clone(),
            chunk_len: self.chunk_len,
            validate: !self.skip_validation,
            normalize_from_raw: self.normalize_from_raw,
            ..TransposeConfig::default()
        }
    }
}

fn main() -> Result<()> {
    logging::init_subscriber();
    let args = Args::parse();
    let config = args.config();

    let store = ZarrStore::open(&args.store)
        .with_context(|| format!("opening {}", args.store.display()))?
        .with_chunk_len(config.chunk_len);
    info!(path = %args.store.display(), "opened store");

    if args.check {
        let complete = check_complete(&store, &config.layout, &config.output)
            .with_context(|| format!("checking group '{}'", config.output))?;
        if !complete {
            anyhow::bail!("group '{}' is incomplete; re-run the transpose", config.output);
        }
        println!("{}: complete", config.output);
        return Ok(());
    }

    let report = run(&store, &config).with_context(|| {
        format!(
            "transposing '{}' into '{}' in {}",
            config.source,
            config.output,
            args.store.display()
        )
    })?;
    println!("{}", report.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library() {
        let args = Args::parse_from(["cscflip", "main.zarr"]);
        let config = args.config();
        let default = TransposeConfig::default();
        assert_eq!(config.partition_count, default.partition_count);
        assert_eq!(config.source, default.source);
        assert_eq!(config.raw_output, default.raw_output);
        assert_eq!(config.chunk_len, default.chunk_len);
        assert!(config.validate);
        assert!(!args.check);
    }

    #[test]
    fn flags_map_onto_config() {
        let args = Args::parse_from([
            "cscflip",
            "main.zarr",
            "-p",
            "4",
            "--output",
            "normalized_v2",
            "--feature-type",
            "ADT",
            "--skip-validation",
            "--normalize-from-raw",
        ]);
        let config = args.config();
        assert_eq!(config.partition_count, 4);
        assert_eq!(config.output, "normalized_v2");
        assert_eq!(config.feature_type, "ADT");
        assert!(!config.validate);
        assert!(config.normalize_from_raw);
    }
}
