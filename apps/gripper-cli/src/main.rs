use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use gripper_serial as gs;
use gripper_serial::{DeviceSession, Freshness, SerialEndpoint, SerialLink, TelemetryReading};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{info, trace, warn};

mod config;
use config::Config;

/// Port the mock backend registers its simulated device under.
const MOCK_PORT: &str = "/dev/ttyUSB-mock0";

#[derive(Parser, Debug)]
#[command(
    name = "gripper",
    version,
    about = "Gripper bench tool",
    disable_help_subcommand = true
)]
struct Cli {
    /// Use the in-process mock backend with a simulated sensor
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    /// JSON config file (defaults apply when missing)
    #[arg(long, global = true, default_value = "gripper.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial devices
    Ports {
        /// Show every device, not only USB-serial adapters
        #[arg(long, action = ArgAction::SetTrue)]
        all: bool,
        /// Name fragment to match (overrides config)
        #[arg(long)]
        filter: Option<String>,
    },
    /// Drive the gripper actuator
    Actuate {
        /// Device path (e.g., /dev/ttyUSB0)
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
        #[command(subcommand)]
        action: Action,
    },
    /// Stream jaw angle readings from the sensor
    Watch {
        /// Device path (e.g., /dev/ttyUSB1)
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
        /// Number of polls before exiting (runs until killed when omitted)
        #[arg(long)]
        count: Option<u32>,
        /// Print one JSON object per poll
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum Action {
    Enable,
    Disable,
    /// Store the current position as zero
    Zero,
    /// Move the jaw to an angle in radians (0.0 to 1.68)
    Position {
        #[arg(long, allow_negative_numbers = true)]
        angle: f32,
        /// Skip sending ENABLE first
        #[arg(long, action = ArgAction::SetTrue)]
        no_enable: bool,
    },
    /// Step through the full travel and back
    Sweep {
        /// Slider step in hundredths of a radian
        #[arg(long, default_value_t = 10u32)]
        step: u32,
        /// Pause between steps in milliseconds
        #[arg(long, default_value_t = 50u64)]
        dwell_ms: u64,
    },
    Velocity {
        #[arg(long, allow_negative_numbers = true)]
        value: f32,
    },
    Effort {
        #[arg(long, allow_negative_numbers = true)]
        value: f32,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    if cli.mock {
        start_mock_sensor();
    }
    match cli.command {
        Commands::Ports { all, filter } => {
            let filter = if all {
                String::new()
            } else {
                filter.unwrap_or_else(|| cfg.port_filter.clone())
            };
            if cli.mock {
                print_ports(&gs::list_ports_with::<gs::MockLink>(&filter));
            } else {
                print_ports(&gs::list_ports_with::<gs::SerialPortLink>(&filter));
            }
            Ok(())
        }
        Commands::Actuate { port, baud, action } => {
            let endpoint = endpoint(&cfg, cli.mock, port, baud)?;
            if cli.mock {
                actuate::<gs::MockLink>(&cfg, endpoint, action)
            } else {
                actuate::<gs::SerialPortLink>(&cfg, endpoint, action)
            }
        }
        Commands::Watch {
            port,
            baud,
            count,
            json,
        } => {
            let endpoint = endpoint(&cfg, cli.mock, port, baud)?;
            if cli.mock {
                watch::<gs::MockLink>(&cfg, endpoint, count, json)
            } else {
                watch::<gs::SerialPortLink>(&cfg, endpoint, count, json)
            }
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn print_ports(ports: &[String]) {
    if ports.is_empty() {
        println!("no device detected");
        return;
    }
    for p in ports {
        println!("{p}");
    }
}

/// Explicit port, else the first matching device, like the GUI's default selection.
fn endpoint(
    cfg: &Config,
    mock: bool,
    port: Option<String>,
    baud: Option<u32>,
) -> Result<SerialEndpoint> {
    let path = match port {
        Some(p) => p,
        None => {
            let found = if mock {
                gs::list_ports_with::<gs::MockLink>(&cfg.port_filter)
            } else {
                gs::list_ports_with::<gs::SerialPortLink>(&cfg.port_filter)
            };
            found
                .into_iter()
                .next()
                .context("no device detected; pass --port")?
        }
    };
    Ok(SerialEndpoint::with_baud(path, baud.unwrap_or(cfg.baud_rate)))
}

fn actuate<L: SerialLink>(cfg: &Config, endpoint: SerialEndpoint, action: Action) -> Result<()> {
    let mut session = DeviceSession::<L>::with_config(cfg.session.clone());
    session
        .connect(endpoint.clone())
        .with_context(|| format!("cannot connect to {endpoint}"))?;
    println!("connected: {endpoint}");

    match action {
        Action::Enable => {
            session.enable().context("enable failed")?;
            println!("gripper enabled");
        }
        Action::Disable => {
            session.disable().context("disable failed")?;
            println!("gripper disabled");
        }
        Action::Zero => {
            session.set_zero().context("set zero failed")?;
            println!("zero set");
        }
        Action::Position { angle, no_enable } => {
            if !no_enable {
                session.enable().context("enable failed")?;
            }
            let sent = session.set_position(angle).context("set position failed")?;
            println!("position: {sent:.2}");
        }
        Action::Sweep { step, dwell_ms } => {
            session.enable().context("enable failed")?;
            for value in sweep_steps(step) {
                let sent = session
                    .set_position(value as f32 / 100.0)
                    .context("set position failed")?;
                println!("position: {sent:.2}");
                thread::sleep(Duration::from_millis(dwell_ms));
            }
        }
        Action::Velocity { value } => {
            session.set_velocity(value).context("set velocity failed")?;
            println!("velocity: {value}");
        }
        Action::Effort { value } => {
            session.set_effort(value).context("set effort failed")?;
            println!("effort: {value}");
        }
    }
    session.disconnect()?;
    Ok(())
}

/// Slider values (hundredths of a radian) for one pass out to full travel
/// and back. Both ends are always included.
fn sweep_steps(step: u32) -> Vec<u32> {
    const TOP: u32 = 168;
    let mut up: Vec<u32> = (0..TOP).step_by(step.max(1) as usize).collect();
    up.push(TOP);
    let down: Vec<u32> = up.iter().rev().skip(1).copied().collect();
    up.extend(down);
    up
}

fn watch<L: SerialLink>(
    cfg: &Config,
    endpoint: SerialEndpoint,
    count: Option<u32>,
    json: bool,
) -> Result<()> {
    let mut session = DeviceSession::<L>::with_config(cfg.session.clone());
    session
        .connect(endpoint.clone())
        .with_context(|| format!("cannot connect to {endpoint}"))?;
    if let Err(e) = session.start_reception(Some(Box::new(|r: TelemetryReading| {
        trace!(angle = r.angle, distance = r.distance, "sample");
    }))) {
        // Mirror the GUI: a sensor that cannot stream is not left connected.
        let _ = session.disconnect();
        return Err(e).context("cannot start data reception");
    }
    info!(port = %endpoint, "receiving");

    let mut polls = 0u32;
    while count.map_or(true, |n| polls < n) {
        thread::sleep(cfg.poll_interval());
        polls += 1;
        let reading = session.latest_reading();
        let freshness = reading.freshness(gs::now_seconds(), cfg.stale_after());
        print_reading(&reading, freshness, json)?;
    }
    session.disconnect()?;
    Ok(())
}

fn print_reading(r: &TelemetryReading, freshness: Freshness, json: bool) -> Result<()> {
    let status = match freshness {
        Freshness::Live => "receiving",
        Freshness::Stale | Freshness::NeverReceived => "no data",
    };
    let band = if gs::angle_in_band(r.angle) { "ok" } else { "out-of-band" };
    if json {
        let line = serde_json::json!({
            "status": status,
            "angle": r.angle,
            "distance": r.distance,
            "timestamp": r.timestamp,
            "band": band,
        });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        println!(
            "status={status}\tangle={:.4}\tdistance={:.4}\tband={band}",
            r.angle, r.distance
        );
    }
    Ok(())
}

/// Register the simulated device and stream sensor records into it.
fn start_mock_sensor() {
    let dev = gs::MockDevice::register(MOCK_PORT);
    let spawned = thread::Builder::new()
        .name("mock-sensor".to_string())
        .spawn(move || {
            let mut t = 0.0f64;
            while !dev.is_closed() {
                let rad = 1.715 + 0.06 * t.sin();
                let line = format!(
                    "{{\"AS5047\": {{\"rad\": {rad:.4}, \"distance\": {:.4}}}}}\r\n",
                    0.05 + 0.01 * t.cos()
                );
                // Only the sensor side consumes inbound bytes; cap the backlog
                // so actuator-only runs don't accumulate data.
                if dev.pending_inbound() < 4096 {
                    dev.feed(line.as_bytes());
                }
                t += 0.05;
                thread::sleep(Duration::from_millis(20));
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "mock sensor not started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_reaches_full_travel_and_returns_to_zero() {
        let steps = sweep_steps(10);
        assert_eq!(steps.first(), Some(&0));
        assert_eq!(steps.last(), Some(&0));
        assert_eq!(steps.iter().max(), Some(&168));
        assert_eq!(steps.iter().filter(|v| **v == 168).count(), 1);
        assert_eq!(steps.len(), 2 * 18 - 1);
        assert!(steps.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn sweep_with_zero_step_still_terminates() {
        let steps = sweep_steps(0);
        assert_eq!(steps.len(), 2 * 169 - 1);
        assert_eq!(steps[168], 168);
    }
}
