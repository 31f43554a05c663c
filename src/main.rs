// src/main.rs
//! Landscape Tiles - tile pyramid and quadtree tooling

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use landscape_tiles::{
    config::TileServerConfig,
    map::maintenance,
    quadtree::MemoryTileRepository,
    MercatorPoint, TileService,
};
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "landscape-tiles", version, about = "Tile pyramid and quadtree tooling")]
struct Args {
    /// Config file (defaults to ~/.config/landscape-tiles/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve every configured layer for one tile request and print JSON
    Lookup {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long)]
        zoom: u32,
    },
    /// Print the root tile of a scenario, creating it if needed
    Root {
        #[arg(long)]
        scenario: u64,
    },
    /// Resolve the bucket tile for a location
    Place {
        #[arg(long)]
        scenario: u64,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        /// Defaults to building_min_lod from the config
        #[arg(long)]
        min_lod: Option<u32>,
        /// Defaults to max_lod from the config
        #[arg(long)]
        max_lod: Option<u32>,
    },
    /// Show tile counts and disk usage of a layer
    Stats {
        #[arg(long)]
        layer: String,
    },
    /// Delete PNG tiles containing transparent pixels
    Prune {
        #[arg(long)]
        layer: String,
        /// Only list the files that would be removed
        #[arg(long)]
        check_only: bool,
    },
    /// Renumber a TMS layer to OSM tile rows in place
    TmsToOsm {
        #[arg(long)]
        layer: String,
    },
}

fn init_logging(config: &TileServerConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn layer_path(config: &TileServerConfig, layer: &str) -> anyhow::Result<PathBuf> {
    match config.raster_layers().remove(layer) {
        Some(layer) => Ok(layer.base_path),
        None => bail!(
            "Unknown layer {}; configured: {:?}",
            layer,
            config.layers.keys().collect::<Vec<_>>()
        ),
    }
}

fn load_store(config: &TileServerConfig) -> anyhow::Result<MemoryTileRepository> {
    MemoryTileRepository::load(&config.tile_store)
        .with_context(|| format!("Loading tile store {}", config.tile_store.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TileServerConfig::load_from(path)
            .with_context(|| format!("Loading config {}", path.display()))?,
        None => TileServerConfig::load().context("Loading config")?,
    };
    init_logging(&config, args.verbose);

    match args.command {
        Command::Lookup { x, y, zoom } => {
            let service = TileService::new(&config, Arc::new(MemoryTileRepository::new()));
            let lookup = service.lookup(MercatorPoint::new(x, y), zoom).await?;
            println!("{}", serde_json::to_string_pretty(&lookup)?);
        }
        Command::Root { scenario } => {
            let repository = Arc::new(load_store(&config)?);
            let service = TileService::new(&config, Arc::clone(&repository));
            let root = service.root(scenario).await?;
            repository.save(&config.tile_store)?;
            println!("{}", serde_json::to_string_pretty(&root)?);
        }
        Command::Place {
            scenario,
            x,
            y,
            min_lod,
            max_lod,
        } => {
            let repository = Arc::new(load_store(&config)?);
            let before = repository.len();
            let service = TileService::new(&config, Arc::clone(&repository));
            let location = MercatorPoint::new(x, y);
            let tile = service.place(scenario, location, min_lod, max_lod).await?;
            repository.save(&config.tile_store)?;
            info!("{} new tile(s) in store", repository.len() - before);
            println!("{}", serde_json::to_string_pretty(&tile)?);
        }
        Command::Stats { layer } => {
            let root = layer_path(&config, &layer)?;
            let stats = maintenance::pyramid_stats(&root)?;
            println!("{}: {} tiles, {:.1} MB", layer, stats.tiles, stats.size_mb());
            for (zoom, count) in &stats.tiles_per_zoom {
                println!("  zoom {:>2}: {}", zoom, count);
            }
        }
        Command::Prune { layer, check_only } => {
            let root = layer_path(&config, &layer)?;
            let removed = maintenance::remove_incomplete_tiles(&root, check_only)?;
            let verb = if check_only { "would remove" } else { "removed" };
            println!("{} {} incomplete tile(s)", verb, removed.len());
        }
        Command::TmsToOsm { layer } => {
            let root = layer_path(&config, &layer)?;
            let renamed = maintenance::tms_to_osm(&root)?;
            println!("renamed {} file(s)", renamed.len());
        }
    }

    Ok(())
}
