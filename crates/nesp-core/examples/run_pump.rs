//! Syringe Pump Run Tool
//!
//! Configures a pump, runs it and reports progress.
//!
//! Usage:
//!   cargo run --example run_pump -- [OPTIONS]
//!
//! Options:
//!   --port PORT        Serial port (default: first port found)
//!   --address N        Pump address 0-99 (default: 0)
//!   --diameter MM      Syringe diameter in mm (default: 26.59)
//!   --volume ML        Volume in mL (default: 1.0)
//!   --rate ML_MIN      Rate in mL/min (default: 1.0)
//!   --withdraw         Withdraw instead of infuse
//!   --no-wait          Start and poll instead of a blocking run
//!   --list             List serial ports and exit

use anyhow::{bail, Context};
use nesp_core::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name: Option<String> = None;
    let mut config = PumpConfig::default();
    let mut diameter = 26.59;
    let mut volume = 1.0;
    let mut rate = 1.0;
    let mut direction = PumpingDirection::Infuse;
    let mut blocking = true;

    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .with_context(|| format!("{} needs a value", args[i]))
        };
        match args[i].as_str() {
            "--port" | "-p" => {
                port_name = Some(value(i)?.clone());
                i += 1;
            }
            "--address" | "-a" => {
                config.address = value(i)?.parse().context("bad address")?;
                i += 1;
            }
            "--diameter" => {
                diameter = value(i)?.parse().context("bad diameter")?;
                i += 1;
            }
            "--volume" => {
                volume = value(i)?.parse().context("bad volume")?;
                i += 1;
            }
            "--rate" => {
                rate = value(i)?.parse().context("bad rate")?;
                i += 1;
            }
            "--withdraw" => direction = PumpingDirection::Withdraw,
            "--no-wait" => blocking = false,
            "--list" => {
                for port in list_ports() {
                    println!("{}\t{}", port.name, port.product.unwrap_or_default());
                }
                return Ok(());
            }
            other => bail!("unknown option {}", other),
        }
        i += 1;
    }

    let port_name = match port_name {
        Some(name) => name,
        None => match list_ports().into_iter().next() {
            Some(port) => port.name,
            None => bail!("no serial ports found"),
        },
    };

    let mut pump = Pump::open(&port_name, config)
        .with_context(|| format!("connecting to pump on {}", port_name))?;
    let identity = pump.identity()?.clone();
    println!("NE-{} firmware {}", identity.model, identity.firmware);

    pump.set_diameter(diameter)?;
    pump.set_direction(direction)?;
    pump.set_volume(volume)?;
    pump.set_rate(rate)?;
    println!("Configured: {:?}", pump.configuration());

    if blocking {
        pump.run(true)?;
    } else {
        pump.run(false)?;
        while pump.running()? {
            let moved = match direction {
                PumpingDirection::Infuse => pump.volume_infused()?,
                PumpingDirection::Withdraw => pump.volume_withdrawn()?,
            };
            println!("{:.3} mL", moved);
            std::thread::sleep(Duration::from_millis(500));
        }
    }

    println!("Finished with status {:?}", pump.last_status());
    Ok(())
}
