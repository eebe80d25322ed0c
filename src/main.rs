//! Grassfield - headless grass simulation runner
//!
//! Usage: cargo run --release --bin grassfield -- [OPTIONS]
//!
//! Options:
//!   --config <FILE>               JSON grass config (default: built-in)
//!   --frames <N>                  Frames to simulate (default: 120)
//!   --dt <SECONDS>                Fixed time step (default: wall clock)
//!   --click <U,V>                 Stamp an impulse at frame 0
//!   --dump-displacement <FILE>    Write |displacement| as a PNG at the end

use std::path::{Path, PathBuf};

use glam::Vec2;

use grassfield::core::{logging, time::FrameTimer, Error};
use grassfield::grass::{GrassConfig, GrassSystem, PatchTransform};
use grassfield::render::{readback, GpuContext};

struct Options {
    config: Option<PathBuf>,
    frames: u64,
    dt: Option<f32>,
    click: Option<Vec2>,
    dump: Option<PathBuf>,
}

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let options = match parse_options(&args) {
        Ok(options) => options,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&options) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(options: &Options) -> Result<(), Error> {
    let config = match &options.config {
        Some(path) => GrassConfig::load(path)?,
        None => GrassConfig::default(),
    };

    let ctx = GpuContext::new_headless_blocking()?;
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, config, PatchTransform::default())?;

    if grass.on_pointer_press(options.click) {
        log::info!("Impulse queued at {:?}", options.click);
    }

    let mut timer = options.dt.map_or_else(FrameTimer::new, FrameTimer::fixed);
    for _ in 0..options.frames {
        let dt = timer.tick();
        let stats = grass.frame(&ctx.device, &ctx.queue, dt)?;

        if let Some(count) = stats.point_count {
            log::debug!("Frame {}: {} blades, dt {:.4}", grass.frames(), count, stats.dt);
        }
    }

    let pacing = timer.pacing();
    log::info!(
        "Simulated {} frames ({:.2}s, {} step): avg {:.2} ms, min {:.2} ms, max {:.2} ms",
        pacing.frames,
        timer.sim_time(),
        if timer.is_fixed() { "fixed" } else { "wall-clock" },
        pacing.avg_ms,
        pacing.min_ms,
        pacing.max_ms,
    );
    if let Some(count) = grass.point_count() {
        log::info!("Live blade count: {}", count);
    }

    if let Some(path) = &options.dump {
        dump_displacement(&ctx, &grass, path)?;
    }
    Ok(())
}

/// Write the displacement magnitude, normalized to its maximum, as grayscale.
fn dump_displacement(ctx: &GpuContext, grass: &GrassSystem, path: &Path) -> Result<(), Error> {
    let physics = grass.physics();
    let texels = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, physics.displacement())?;
    let magnitudes: Vec<f32> = texels.iter().map(|t| Vec2::new(t[0], t[1]).length()).collect();
    let max = magnitudes.iter().copied().fold(0.0f32, f32::max);
    let scale = if max > 0.0 { 255.0 / max } else { 0.0 };

    let size = physics.size();
    let pixels: Vec<u8> = magnitudes.iter().map(|m| (m * scale).round() as u8).collect();
    let image = image::GrayImage::from_raw(size.x, size.y, pixels)
        .ok_or_else(|| Error::Resource("displacement image size mismatch".to_string()))?;
    image.save(path)?;

    log::info!("Wrote {} (max displacement {:.4})", path.display(), max);
    Ok(())
}

fn parse_options(args: &[String]) -> Result<Options, Error> {
    Ok(Options {
        config: parse_str_arg(args, "--config").map(PathBuf::from),
        frames: parse_arg(args, "--frames")?.unwrap_or(120),
        dt: parse_arg(args, "--dt")?,
        click: parse_vec2_arg(args, "--click")?,
        dump: parse_str_arg(args, "--dump-displacement").map(PathBuf::from),
    })
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>, Error> {
    parse_str_arg(args, flag)
        .map(|s| s.parse().map_err(|_| Error::Config(format!("invalid value for {flag}: {s}"))))
        .transpose()
}

fn parse_vec2_arg(args: &[String], flag: &str) -> Result<Option<Vec2>, Error> {
    let Some(s) = parse_str_arg(args, flag) else {
        return Ok(None);
    };
    let invalid = || Error::Config(format!("{flag} expects U,V, got {s}"));
    let (u, v) = s.split_once(',').ok_or_else(invalid)?;
    let u: f32 = u.trim().parse().map_err(|_| invalid())?;
    let v: f32 = v.trim().parse().map_err(|_| invalid())?;
    Ok(Some(Vec2::new(u, v)))
}
