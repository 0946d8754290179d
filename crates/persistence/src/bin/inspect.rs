#![deny(warnings)]

//! Print the header of a GT dataset and, optionally, one stored series.
//!
//! Usage: `gt-inspect FILE [--quantity cash|goods|price --agent N --pair N]`

use anyhow::{bail, Context, Result};
use gt_core::Quantity;
use persistence::StoreReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    file: Option<String>,
    quantity: Option<String>,
    agent: Option<usize>,
    pair: Option<usize>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--quantity" => args.quantity = it.next(),
            "--agent" => args.agent = it.next().and_then(|s| s.parse().ok()),
            "--pair" => args.pair = it.next().and_then(|s| s.parse().ok()),
            _ => args.file = Some(arg),
        }
    }
    args
}

fn quantity(name: &str) -> Result<Quantity> {
    Quantity::ALL
        .into_iter()
        .find(|q| q.name() == name)
        .with_context(|| format!("unknown quantity '{name}'"))
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    let Some(file) = args.file.as_deref() else {
        bail!("usage: gt-inspect FILE [--quantity Q --agent N --pair N]");
    };
    let mut reader =
        StoreReader::open(file).with_context(|| format!("failed to open store {file}"))?;
    info!(file, shape = ?reader.header().shape(), "opened store");
    println!("{}", serde_json::to_string_pretty(reader.header())?);

    if let Some(name) = args.quantity.as_deref() {
        let q = quantity(name)?;
        let agent = args.agent.unwrap_or(0);
        let pair = args.pair.unwrap_or(0);
        let series = reader.read_series(q, agent, pair)?;
        let alpha_mu = reader.header().pairs.get(pair).copied();
        println!("{name} | agent {agent} | pair {pair} {alpha_mu:?}");
        for (epoch, value) in series.iter().enumerate() {
            println!("{epoch}\t{value}");
        }
    }
    Ok(())
}
