//! track_leds - RGB LED tracking daemon.
//!
//! This binary:
//! 1. Loads and validates the tracker configuration (file, env, CLI)
//! 2. Opens the camera source
//! 3. Runs the per-frame detection session
//! 4. Streams per-channel positions over OSC/UDP
//!
//! Ctrl-C flips the camera's stop flag, so the session observes a normal
//! end of stream and still reports the trajectories collected so far.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use led_tracker::{
    CameraConfig, CameraSource, Channel, OscSender, Roi, TrackerConfig, TrackerSession,
};

#[derive(Parser, Debug)]
#[command(
    name = "track_leds",
    version,
    about = "Track up to three colored LEDs and stream their positions over OSC"
)]
struct Args {
    /// Path to a JSON config file (also: LED_TRACKER_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// IP address or host name of the server receiving positions.
    #[arg(long)]
    server_address: Option<String>,

    /// Send positions in pixel coordinates instead of the 0-1 range.
    #[arg(long)]
    pixel_coords: bool,

    /// Camera device path; stub:// selects a synthetic test pattern.
    #[arg(long)]
    device: Option<String>,

    /// Channels to track, a subset of "rgb".
    #[arg(long)]
    channels: Option<String>,

    /// Port for red LED data.
    #[arg(long)]
    r_port: Option<u16>,

    /// Port for green LED data.
    #[arg(long)]
    g_port: Option<u16>,

    /// Port for blue LED data.
    #[arg(long)]
    b_port: Option<u16>,

    /// Detection threshold for the red LED (0-255 range).
    #[arg(long)]
    r_thr: Option<u8>,

    /// Detection threshold for the green LED (0-255 range).
    #[arg(long)]
    g_thr: Option<u8>,

    /// Detection threshold for the blue LED (0-255 range).
    #[arg(long)]
    b_thr: Option<u8>,

    /// Frame rate to use for the camera.
    #[arg(long)]
    frame_rate: Option<u32>,

    /// Resolution (width, height) for the camera.
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    resolution: Option<Vec<u32>>,

    /// Region of interest to crop out of the video, as top, left, bottom
    /// and right position.
    #[arg(long, num_args = 4, value_names = ["TOP", "LEFT", "BOTTOM", "RIGHT"])]
    roi: Option<Vec<u32>>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = TrackerConfig::load(args.config.as_deref())?;
    apply_args(&mut config, &args)?;
    config.validate()?;

    let camera = CameraSource::open(CameraConfig {
        device: config.device.clone(),
        frame_rate: config.frame_rate,
        resolution: config.resolution,
        frame_budget: None,
    })?;

    let stop = camera.stop_flag();
    ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
        .context("install ctrl-c handler")?;

    let sender = OscSender::new(&config.host, &config.endpoints())?;

    let routes = config
        .endpoints()
        .iter()
        .map(|(c, p)| format!("/{} -> {}:{}", c.tag(), config.host, p))
        .collect::<Vec<_>>()
        .join(", ");
    log::info!("track_leds: dispatching {}", routes);

    let session = TrackerSession::new(&config, camera, sender)?;
    let size = session.frame_size();
    log::info!(
        "track_leds: tracking {} channel(s) at {}x{}{}",
        config.tracked_channels().len(),
        size.width,
        size.height,
        if config.pixel_coords {
            " (pixel coords)"
        } else {
            ""
        }
    );

    let trajectories = session.run();
    for (channel, _) in config.tracked_channels() {
        log::info!(
            "track_leds: /{}: {} positions recorded",
            channel.tag(),
            trajectories.len(channel)
        );
    }
    Ok(())
}

fn apply_args(config: &mut TrackerConfig, args: &Args) -> Result<()> {
    if let Some(host) = &args.server_address {
        config.host = host.clone();
    }
    if args.pixel_coords {
        config.pixel_coords = true;
    }
    if let Some(device) = &args.device {
        config.device = device.clone();
    }
    if let Some(rate) = args.frame_rate {
        config.frame_rate = rate;
    }
    if let Some(resolution) = &args.resolution {
        config.resolution = Some((resolution[0], resolution[1]));
    }
    if let Some(roi) = &args.roi {
        config.roi = Some(Roi::new(roi[0], roi[1], roi[2], roi[3]));
    }
    if let Some(spec) = &args.channels {
        restrict_channels(config, spec)?;
    }

    let overrides = [
        (Channel::Red, args.r_thr, args.r_port),
        (Channel::Green, args.g_thr, args.g_port),
        (Channel::Blue, args.b_thr, args.b_port),
    ];
    for (channel, threshold, port) in overrides {
        if let Some(settings) = config.channel_mut(channel).as_mut() {
            if let Some(threshold) = threshold {
                settings.threshold = threshold;
            }
            if let Some(port) = port {
                settings.port = port;
            }
        }
    }
    Ok(())
}

/// Disable every channel not named in `spec` ("rgb", "rg", "b", ...).
fn restrict_channels(config: &mut TrackerConfig, spec: &str) -> Result<()> {
    let mut keep = [false; 3];
    for tag in spec.chars() {
        match tag {
            'r' => keep[Channel::Red as usize] = true,
            'g' => keep[Channel::Green as usize] = true,
            'b' => keep[Channel::Blue as usize] = true,
            other => {
                return Err(anyhow!(
                    "unknown channel '{}' in --channels (expected a subset of \"rgb\")",
                    other
                ))
            }
        }
    }
    for channel in Channel::ALL {
        if !keep[channel as usize] {
            *config.channel_mut(channel) = None;
        }
    }
    Ok(())
}
