//! DualSense monitor.
//!
//! Opens one controller, polls it and prints every snapshot. Unless a preset
//! is given, the outputs follow the inputs: sticks drive the rumble motors,
//! Mic / R1 / L1 cycle the mic LED, player LEDs and their brightness, and the
//! lightbar sweeps a colour wheel.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, info, warn};

use dualsense::{
    enumerate_controllers, list_devices, preset, Button, ButtonDelta, ControllerState, DualSense,
    InputSnapshot, LightbarColor, MicLed, OutputIntent, PlayerLed, PlayerLedBrightness,
    PollHandler, Transport, TriggerEffect,
};

#[derive(Parser)]
#[command(name = "dualsense-monitor", about = "Poll a DualSense controller and show its state")]
struct Args {
    /// List attached controllers and exit
    #[arg(long)]
    list: bool,

    /// Controller to open (position in --list)
    #[arg(long, default_value_t = 0)]
    index: usize,

    /// Polling interval in milliseconds
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,

    /// Stick dead zone
    #[arg(long, default_value_t = 0.1)]
    dead_zone: f32,

    /// JSON output preset to apply instead of the interactive demo
    #[arg(long)]
    preset: Option<PathBuf>,

    /// Exchange a single report pair and exit
    #[arg(long)]
    once: bool,

    /// Print snapshots as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    if args.list {
        let api = hidapi::HidApi::new().context("failed to initialise hidapi")?;
        let devices = list_devices(&api);
        if devices.is_empty() {
            println!("No DualSense controllers found.");
        }
        for (i, d) in devices.iter().enumerate() {
            println!(
                "{i}: {} ({:?}) serial={} path={}",
                d.product.as_deref().unwrap_or("DualSense"),
                d.bus,
                d.serial_number.as_deref().unwrap_or("-"),
                d.path.to_string_lossy()
            );
        }
        return Ok(());
    }

    let mut controllers = enumerate_controllers().context("failed to enumerate controllers")?;
    if args.index >= controllers.len() {
        bail!(
            "controller {} not found ({} attached)",
            args.index,
            controllers.len()
        );
    }
    let mut ds = controllers.swap_remove(args.index);
    drop(controllers);

    ds.open().context("failed to open controller")?;
    ds.set_dead_zone(args.dead_zone);
    info!("[MON] Connected over {}", ds.io_mode());

    let animate = args.preset.is_none();
    let output = match &args.preset {
        Some(path) => preset::load(path)?,
        None => demo_output(),
    };
    ds.set_output(output);

    if args.once {
        let snapshot = tokio::task::block_in_place(|| ds.read_write_once())
            .context("report exchange failed")?;
        print_snapshot(&snapshot, args.json)?;
        ds.close();
        return Ok(());
    }

    let interval = Duration::from_millis(args.interval_ms);
    ds.begin_polling(interval, Monitor::new(args.json, animate))?;
    info!("[MON] Polling every {}ms. Ctrl-C to stop.", args.interval_ms);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut watchdog = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            r = &mut ctrl_c => {
                r.context("failed to listen for Ctrl-C")?;
                info!("[MON] Shutting down...");
                break;
            }
            _ = watchdog.tick() => {
                if ds.poller_exited() {
                    warn!("[MON] Polling worker exited");
                    break;
                }
            }
        }
    }

    tokio::task::block_in_place(|| shutdown(&mut ds)).context("polling stopped with an error")?;
    info!("Done.");
    Ok(())
}

/// Stop polling, restore the controller's default output and release it.
///
/// Returns the error that ended polling early, if any.
fn shutdown<T: Transport + 'static>(ds: &mut DualSense<T>) -> dualsense::Result<()> {
    let polled = ds.end_polling();
    ds.set_output(OutputIntent::default());
    if let Err(e) = ds.read_write_once() {
        warn!("[MON] Final output reset failed: {e}");
    }
    ds.close();
    polled
}

/// Output applied before polling when no preset is given.
fn demo_output() -> OutputIntent {
    OutputIntent::default()
        .with_lightbar_color(color_wheel(0))
        .with_trigger_effects(
            TriggerEffect::section(0.0, 0.5),
            TriggerEffect::vibrate(10, 0.5, 1.0, 1.0),
        )
}

fn print_snapshot(snapshot: &InputSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }
    let (ls, rs) = (snapshot.left_stick(), snapshot.right_stick());
    let (t1, t2) = (snapshot.touch1(), snapshot.touch2());
    let (gyro, accel) = (snapshot.gyro(), snapshot.accelerometer());
    let battery = snapshot.battery();
    println!("LS: ({:.2}, {:.2})  RS: ({:.2}, {:.2})", ls.x, ls.y, rs.x, rs.y);
    println!("Triggers: ({:.2}, {:.2})", snapshot.l2(), snapshot.r2());
    println!("Touch 1: ({}, {}, {}, {})", t1.x, t1.y, t1.is_down, t1.id);
    println!("Touch 2: ({}, {}, {}, {})", t2.x, t2.y, t2.is_down, t2.id);
    println!("Gyro: ({}, {}, {})", gyro.x, gyro.y, gyro.z);
    println!("Accel: ({}, {}, {})", accel.x, accel.y, accel.z);
    println!("Headphones: {}", snapshot.headphones_connected());
    println!(
        "Battery: {}%, charging={}, full={}",
        battery.level, battery.is_charging, battery.is_fully_charged
    );
    let pressed: Vec<_> = snapshot.buttons().pressed().map(|b| b.name()).collect();
    println!("Buttons: {}", pressed.join(", "));
    Ok(())
}

struct Monitor {
    json: bool,
    animate: bool,
    wheel_position: u16,
}

impl Monitor {
    fn new(json: bool, animate: bool) -> Self {
        Self {
            json,
            animate,
            wheel_position: 0,
        }
    }
}

impl PollHandler for Monitor {
    fn on_state_polled(&mut self, state: &mut ControllerState) {
        if let Err(e) = print_snapshot(state.input(), self.json) {
            warn!("[MON] Failed to print snapshot: {e}");
        }
        if !self.animate {
            return;
        }

        let left = state.input().left_stick().y.abs();
        let right = state.input().right_stick().y.abs();
        let out = state.output_mut();
        out.left_rumble = left;
        out.right_rumble = right;
        out.lightbar_color = color_wheel(self.wheel_position);
        self.wheel_position = (self.wheel_position + 5) % 384;
    }

    fn on_button_state_changed(&mut self, state: &mut ControllerState, delta: &ButtonDelta) {
        for button in delta.released() {
            debug!("[MON] {button} released");
        }
        for button in delta.pressed() {
            debug!("[MON] {button} pressed");
            if !self.animate {
                continue;
            }
            let out = state.output_mut();
            match button {
                Button::Mic => out.mic_led = next_mic_led(out.mic_led),
                Button::R1 => out.player_led = next_player_led(out.player_led),
                Button::L1 => {
                    out.player_led_brightness = next_brightness(out.player_led_brightness)
                }
                _ => {}
            }
        }
    }

    fn tracks_buttons(&self) -> bool {
        true
    }
}

fn next_mic_led(current: MicLed) -> MicLed {
    match current {
        MicLed::Off => MicLed::Pulse,
        MicLed::Pulse => MicLed::On,
        MicLed::On => MicLed::Off,
    }
}

fn next_player_led(current: PlayerLed) -> PlayerLed {
    match current {
        PlayerLed::NONE => PlayerLed::PLAYER_1,
        PlayerLed::PLAYER_1 => PlayerLed::PLAYER_2,
        PlayerLed::PLAYER_2 => PlayerLed::PLAYER_3,
        PlayerLed::PLAYER_3 => PlayerLed::PLAYER_4,
        PlayerLed::PLAYER_4 => PlayerLed::ALL,
        _ => PlayerLed::NONE,
    }
}

fn next_brightness(current: PlayerLedBrightness) -> PlayerLedBrightness {
    match current {
        PlayerLedBrightness::High => PlayerLedBrightness::Low,
        PlayerLedBrightness::Low => PlayerLedBrightness::Medium,
        PlayerLedBrightness::Medium => PlayerLedBrightness::High,
    }
}

/// Half-brightness RGB wheel over positions 0..384.
fn color_wheel(position: u16) -> LightbarColor {
    let step = (position % 128) as u8;
    let (r, g, b) = match position / 128 {
        0 => (127 - step, step, 0),
        1 => (0, 127 - step, step),
        2 => (step, 0, 127 - step),
        _ => (0, 0, 0),
    };
    LightbarColor::from_rgb8(r, g, b)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use dualsense::{frame_output_report, IoMode, Transfer, TransportError};

    use super::*;

    /// Answers every write with a USB report holding both sticks fully up.
    struct SticksUp {
        open: bool,
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Transport for SticksUp {
        fn is_open(&self) -> bool {
            self.open
        }

        fn open(&mut self) -> Result<(), TransportError> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn transfer(&mut self, frame: &[u8]) -> Result<Transfer, TransportError> {
            self.writes.lock().unwrap().push(frame.to_vec());
            let mut data = vec![0u8; 64];
            data[0] = 0x01;
            data[1..5].copy_from_slice(&[0x80, 0x00, 0x80, 0x00]);
            data[8] = 0x08;
            Ok(Transfer {
                bytes_transferred: 64,
                data,
            })
        }
    }

    #[test]
    fn test_shutdown_leaves_default_output() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let transport = SticksUp {
            open: false,
            writes: writes.clone(),
        };
        let mut ds = DualSense::new(transport, 64, 48).unwrap();
        ds.open().unwrap();
        ds.set_output(demo_output());
        ds.begin_polling(Duration::from_millis(1), Monitor::new(true, true))
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while writes.lock().unwrap().len() < 3 {
            assert!(std::time::Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(1));
        }
        // The handler has been driving the rumble from the sticks.
        assert_eq!(ds.output().left_rumble, 1.0);

        shutdown(&mut ds).unwrap();
        assert!(!ds.is_open());

        let expected =
            frame_output_report(IoMode::Usb, &OutputIntent::default().build_payload(), 48).unwrap();
        assert_eq!(writes.lock().unwrap().last(), Some(&expected));
    }

    #[test]
    fn test_mic_led_cycle() {
        let mut led = MicLed::Off;
        let mut seen = Vec::new();
        for _ in 0..3 {
            led = next_mic_led(led);
            seen.push(led);
        }
        assert_eq!(seen, vec![MicLed::Pulse, MicLed::On, MicLed::Off]);
    }

    #[test]
    fn test_player_led_cycle() {
        let mut led = PlayerLed::NONE;
        for expected in [
            PlayerLed::PLAYER_1,
            PlayerLed::PLAYER_2,
            PlayerLed::PLAYER_3,
            PlayerLed::PLAYER_4,
            PlayerLed::ALL,
            PlayerLed::NONE,
        ] {
            led = next_player_led(led);
            assert_eq!(led, expected);
        }
        assert_eq!(next_player_led(PlayerLed::LEFT), PlayerLed::NONE);
    }

    #[test]
    fn test_brightness_cycle() {
        assert_eq!(next_brightness(PlayerLedBrightness::High), PlayerLedBrightness::Low);
        assert_eq!(next_brightness(PlayerLedBrightness::Low), PlayerLedBrightness::Medium);
        assert_eq!(next_brightness(PlayerLedBrightness::Medium), PlayerLedBrightness::High);
    }

    #[test]
    fn test_color_wheel() {
        assert_eq!(color_wheel(0), LightbarColor::from_rgb8(127, 0, 0));
        assert_eq!(color_wheel(130), LightbarColor::from_rgb8(0, 125, 2));
        assert_eq!(color_wheel(383), LightbarColor::from_rgb8(127, 0, 0));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["dualsense-monitor"]);
        assert_eq!(args.interval_ms, 100);
        assert_eq!(args.dead_zone, 0.1);
        assert_eq!(args.index, 0);
        assert!(args.preset.is_none());
    }
}
