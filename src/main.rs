/*
 *  main.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Dashboard runner, config to widgets to composited frames
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use lydash::config::{self, Cli, Config};
use lydash::pacer::AutoPacer;
use lydash::widgets::{registry, WidgetContext};
use lydash::Compositor;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

const MIN_FPS: u32 = 1;
const MAX_IDLE: Duration = Duration::from_millis(50);

#[cfg(unix)]
async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

/// Build the widget stack and compose frames until stopped or
/// `max_frames` is reached. Runs off the async runtime, sensor handles
/// may block.
fn run_compositor(cfg: Config, max_frames: Option<u64>, stop: Arc<AtomicBool>) -> Result<u64> {
    let ctx = WidgetContext::system();
    let created = registry::global()
        .create_widgets(&cfg.widgets, &ctx)
        .context("constructing widgets")?;
    for (id, e) in &created.failures {
        warn!("{} replaced by error proxy: {}", id, e);
    }

    let (width, height) = cfg.display_size();
    let background = cfg.display.as_ref().and_then(|d| d.background).unwrap_or(0);
    let fps = cfg.frame_rate();
    info!("display {}x{} @ {} fps", width, height, fps);

    let mut compositor = Compositor::new(width, height, created.widgets, ctx.timebase.clone())
        .with_background(background);
    let mut pacer = AutoPacer::new(fps, fps, MIN_FPS, Instant::now());
    let mut frames = 0u64;

    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if !pacer.should_flush(now) {
            thread::sleep(pacer.until_next(now).min(MAX_IDLE));
            continue;
        }
        let started = Instant::now();
        compositor.tick();
        if let Some(path) = cfg.snapshot.as_ref() {
            if let Err(e) = compositor.snapshot(path) {
                warn!("snapshot {} failed: {}", path.display(), e);
            }
        }
        pacer.record_frame_ms(started.elapsed().as_secs_f32() * 1000.0);
        frames += 1;
        if max_frames.is_some_and(|max| frames >= max) {
            info!("frame limit {} reached", frames);
            break;
        }
    }

    compositor.stop_all();
    Ok(frames)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli).context("loading configuration")?;

    let level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    if cli.dump_config {
        print!("{}", serde_yaml::to_string(&cfg).context("serialising configuration")?);
        return Ok(());
    }

    info!("This {} worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let stop = Arc::new(AtomicBool::new(false));
    let loop_stop = stop.clone();
    let max_frames = cli.frames;
    let mut looper = tokio::task::spawn_blocking(move || run_compositor(cfg, max_frames, loop_stop));

    let finished = tokio::select! {
        r = signal_handler() => {
            if let Err(e) = r {
                error!("signal handler failed: {}", e);
            }
            None
        }
        r = &mut looper => Some(r),
    };

    stop.store(true, Ordering::Relaxed);
    let frames = match finished {
        Some(r) => r,
        None => looper.await,
    }
    .context("compositor loop panicked")??;

    info!("{} frames composed, bye", frames);
    Ok(())
}
