mod ascii;
mod scene;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use glimmer_lighting::SourcePool;
use glimmer_world::TileMap;

use crate::scene::{SceneConfig, TracerMode};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Incremental 2D light tracing demo", long_about = None)]
struct Args {
    /// Scene file (TOML). Uses the built-in two-room scene when omitted.
    #[arg(long)]
    scene: Option<PathBuf>,
    /// Compute each frame on the main thread instead of the background worker.
    #[arg(long)]
    sync: bool,
    /// Map layer to print.
    #[arg(long, default_value_t = 0)]
    layer: i32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let scene = match &args.scene {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("loading scene {}", path.display()))?,
        None => SceneConfig::builtin().context("loading built-in scene")?,
    };
    if args.layer < 0 || args.layer as usize >= scene.map.depth {
        bail!("layer {} outside map depth {}", args.layer, scene.map.depth);
    }
    let sync = args.sync || scene.tracer.mode == TracerMode::Sync;

    let map = TileMap::new(
        scene.map.width,
        scene.map.height,
        scene.map.depth,
        Arc::new(SourcePool::new()),
    );
    scene.populate(&map);
    if !sync {
        map.tracer().start();
    }

    settle(&map, sync)?;
    print_frame(&map, args.layer, "initial");
    if !scene.edits.is_empty() {
        scene.apply_edits(&map);
        settle(&map, sync)?;
        print_frame(&map, args.layer, "after edits");
    }

    map.tracer().shutdown();
    let stats = map.tracer().stats();
    log::info!(
        "done: {} pass(es), {} computed, {} applied, {} restart(s), {} fault(s)",
        stats.passes,
        stats.computed,
        stats.applied,
        stats.restarts,
        stats.faults
    );
    Ok(())
}

fn settle(map: &TileMap, sync: bool) -> anyhow::Result<()> {
    if sync {
        if !map.tracer().render_lights() {
            bail!("lighting map dropped during render");
        }
        return Ok(());
    }
    if !map.tracer().wait_idle(SETTLE_TIMEOUT) {
        bail!("tracer did not settle within {:?}", SETTLE_TIMEOUT);
    }
    Ok(())
}

fn print_frame(map: &TileMap, layer: i32, label: &str) {
    println!("-- {} (layer {}, pass {}) --", label, layer, map.render_passes());
    print!("{}", ascii::render_layer(map, layer));
}
