#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use rohc_demo::{config::Config, run_stream};

fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    simple_logger::init_with_level(config.log.level.as_level())?;

    log::info!(
        "running synthetic {:?} stream: {} packets, max_cid={}, mrru={}",
        config.stream.profile,
        config.stream.packets,
        config.max_cid,
        config.mrru,
    );

    let stats = run_stream(&config.stream, config.max_cid, config.mrru);

    log::info!(
        "{} packets, {} -> {} bytes ({:.1}% of original)",
        stats.packets,
        stats.original_bytes,
        stats.compressed_bytes,
        stats.compression_ratio() * 100.0,
    );

    let mut kinds: Vec<_> = stats.packet_types.iter().collect();
    kinds.sort_by_key(|(name, _)| *name);
    for (kind, count) in kinds {
        log::info!("  {kind}: {count}");
    }

    Ok(())
}
