#![deny(warnings)]

//! Command-line entry point for GT parameter sweeps.
//!
//! `gt-sweep --network-folder DIR --network NAME [--config FILE.yaml] [--index N]`

use anyhow::{bail, Context, Result};
use gt_core::{NetworkRef, RawConfig, SimulationConfig};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: gt-sweep --network-folder DIR --network NAME [--config FILE.yaml] [--index N]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    network_folder: Option<String>,
    network: Option<String>,
    config: Option<String>,
    index: Option<usize>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    let mut parsed = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--network-folder" => parsed.network_folder = it.next(),
            "--network" => parsed.network = it.next(),
            "--config" => parsed.config = it.next(),
            "--index" => parsed.index = it.next().and_then(|s| s.parse().ok()),
            _ => {}
        }
    }
    parsed
}

fn load_config(path: Option<&Path>, index: Option<usize>) -> Result<SimulationConfig> {
    let mut raw = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str::<RawConfig>(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => RawConfig::default(),
    };
    if index.is_some() {
        raw.simulation_index = index;
    }
    Ok(SimulationConfig::from_raw(raw)?)
}

fn generator() -> String {
    format!(
        "gt-sweep {} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_SHA"),
        env!("BUILD_DATE")
    )
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args(std::env::args().skip(1));
    let (folder, name) = match (args.network_folder.as_deref(), args.network.as_deref()) {
        (Some(folder), Some(name)) => (folder, name),
        _ => bail!(USAGE),
    };
    let config = load_config(args.config.as_deref().map(Path::new), args.index)?;
    let generator = generator();
    info!(%generator, network = name, ?config, "starting sweep");

    let network = NetworkRef::new(folder, name);
    let report = gt_runtime::launch(&network, &config, &generator)
        .with_context(|| format!("sweep over network '{name}' failed"))?;

    println!(
        "Sweep OK | parameter chunks: {} | windows: {} | persisted: {} | elapsed: {:.2}s",
        report.parameter_chunks,
        report.windows_computed,
        report.windows_persisted,
        report.elapsed.as_secs_f64()
    );
    if let Some(output) = &report.output {
        println!("Output | {}", output.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Args {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_all_flags() {
        let a = args(&[
            "--network-folder",
            "nets",
            "--network",
            "er_100",
            "--config",
            "run.yaml",
            "--index",
            "4",
        ]);
        assert_eq!(a.network_folder.as_deref(), Some("nets"));
        assert_eq!(a.network.as_deref(), Some("er_100"));
        assert_eq!(a.config.as_deref(), Some("run.yaml"));
        assert_eq!(a.index, Some(4));
    }

    #[test]
    fn defaults_without_config_file() {
        let cfg = load_config(None, Some(2)).unwrap();
        assert_eq!(cfg.simulation_index, 2);
        assert_eq!(cfg.epochs, 100);
    }

    #[test]
    fn yaml_config_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        let yaml = "epochs: 10\n\
                    epochs_chunk_size: 5\n\
                    alpha_mu_interval: 500\n\
                    alpha_mu_chunk_size: 1\n";
        std::fs::write(&path, yaml).unwrap();
        let cfg = load_config(Some(&path), None).unwrap();
        assert_eq!(cfg.epochs, 10);
        assert_eq!(cfg.parameter_space().unwrap().windows.len(), 2);

        std::fs::write(&path, "epochs: 10\nepochs_chunk_size: 20\n").unwrap();
        assert!(load_config(Some(&path), None).is_err());
        std::fs::write(&path, "epoch: 10\n").unwrap();
        assert!(load_config(Some(&path), None).is_err());
    }
}
