//! Open a local installation and print what the reader loaded.
//!
//! Usage:
//!   cargo run --example dump_storage -p casc-reader-storage -- \
//!       /path/to/wow [product] [path-or-id...]
//!
//! `CASC_READER_PATH` can stand in for the first argument. Logging follows
//! `RUST_LOG` (default `info`).

use anyhow::{Context, bail};
use casc_reader_storage::{FileLocator, StorageConfig, StorageReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(base_path) = args.next().or_else(|| std::env::var("CASC_READER_PATH").ok()) else {
        bail!("usage: dump_storage <install path> [product] [path-or-id...]");
    };

    let mut config = StorageConfig::new(&base_path);
    if let Some(product) = args.next() {
        config = config.with_product(product);
    }

    let reader = StorageReader::open(config)
        .await
        .with_context(|| format!("opening storage at {base_path}"))?;

    println!("{}", serde_json::to_string_pretty(&reader.stats())?);
    if let Some(manifest) = reader.manifest() {
        println!(
            "Build {} ({}), {} VFS roots",
            manifest.build_key,
            manifest.build_name.as_deref().unwrap_or("unnamed"),
            manifest.vfs_roots.len()
        );
    }

    for path in reader.list_paths("").iter().take(10) {
        println!("  {path}");
    }

    for request in args {
        let locator = FileLocator::parse(&request);
        match reader.resolve(&locator) {
            Ok(data) => println!("{locator}: {} bytes", data.len()),
            Err(e) => println!("{locator}: {e}"),
        }
    }

    reader.close();
    Ok(())
}
