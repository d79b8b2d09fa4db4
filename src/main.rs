// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::Level;

use pmbridge::{
    Backend, DeviceId, Direction, Event, Filter, Loopback, MidiStream, PortConfig, PortMidi,
};

#[cfg(feature = "portmidi")]
fn native_backend() -> pmbridge::PortMidiLibrary {
    pmbridge::PortMidiLibrary::new()
}

#[cfg(not(feature = "portmidi"))]
fn native_backend() -> Loopback {
    Loopback::default()
}

fn print_usage() {
    println!("pmbridge - PortMidi device bridge");
    println!();
    println!("Usage: pmbridge [-v] [--config <FILE>] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  --list-devices            List MIDI devices");
    println!("  --monitor [N] [SECONDS]   Print input from device N (default 30 seconds)");
    println!("  --test-note [N]           Send a test note to output device N");
    println!("  --loopback-demo           Round-trip events through a virtual port");
    println!("  --help                    Show this help message");
    println!();
    println!("Options:");
    println!("  --config <FILE>           Load port settings from YAML or TOML");
    println!("  -v, -vv                   Increase log verbosity");
    println!();
    println!("Without N, the device named in the config is used, else the system default.");
}

fn list_devices<B: Backend>(pm: &PortMidi<B>) -> Result<()> {
    let default_in = pm.default_input_device_id()?;
    let default_out = pm.default_output_device_id()?;

    println!("MIDI devices:");
    for (id, info) in pm.devices()? {
        let marker = if Some(id) == default_in || Some(id) == default_out {
            " (default)"
        } else {
            ""
        };
        println!("  {}: {}{}", id, info, marker);
    }
    Ok(())
}

fn monitor_input<B: Backend>(
    pm: &PortMidi<B>,
    config: &PortConfig,
    device: DeviceId,
    seconds: u64,
) -> Result<()> {
    // Start the clock before opening; the input stream timestamps against it.
    let timer = pm.start_timer(config.timer_resolution_ms)?;
    let mut input = pm
        .open_input(device, config.input_buffer_size)
        .with_context(|| format!("Failed to open input device {}", device))?;

    println!("Monitoring MIDI device {} for {} seconds...", device, seconds);
    println!();

    let window = i32::try_from(seconds.saturating_mul(1000)).unwrap_or(i32::MAX);
    let end = timer.now().saturating_add(window);
    while timer.now() < end {
        if input.poll()? {
            for event in input.read(config.monitor_chunk.max(1))? {
                println!("{}", event);
            }
        } else {
            timer.sleep(Duration::from_millis(1));
        }
    }

    input.close()?;
    timer.stop()?;
    println!();
    println!("Monitor complete!");
    Ok(())
}

fn send_test_note<B: Backend>(pm: &PortMidi<B>, config: &PortConfig, device: DeviceId) -> Result<()> {
    let timer = pm.start_timer(config.timer_resolution_ms)?;
    let mut output = pm
        .open_output(device, config.output_buffer_size, config.latency_ms)
        .with_context(|| format!("Failed to open output device {}", device))?;

    let note = 60; // Middle C
    let velocity = 100;

    println!("Sending test note (Middle C, velocity {})...", velocity);
    output.write_short(timer.now(), Event::pack(0x90, note, velocity))?;
    timer.sleep(Duration::from_millis(500));
    output.write_short(timer.now(), Event::pack(0x80, note, 0))?;

    output.close()?;
    timer.stop()?;
    println!("Test complete!");
    Ok(())
}

fn loopback_demo(config: &PortConfig) -> Result<()> {
    let pm = PortMidi::initialize(Loopback::new().with_port("Demo"))?;
    let timer = pm.start_timer(config.timer_resolution_ms)?;
    {
        let mut input = pm.open_input(DeviceId(0), config.input_buffer_size)?;
        let mut output = pm.open_output(DeviceId(1), config.output_buffer_size, 1)?;
        input.set_filter(Filter::ACTIVE | Filter::CLOCK)?;

        let now = timer.now();
        let chord: Vec<Event> = [60u8, 64, 67]
            .iter()
            .enumerate()
            .map(|(i, &note)| Event::from_bytes(0x90, note, 100, now + i as i32))
            .collect();
        output.write_all(&chord)?;
        output.write_short(now, 0xF8)?;
        output.write_sysex(now, &[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7])?;

        println!("Sent {} notes, a clock tick and an identity request", chord.len());
        while input.poll()? {
            for event in input.read(config.monitor_chunk.max(1))? {
                println!("{}", event);
            }
        }

        output.close()?;
        input.close()?;
    }
    timer.stop()?;
    pm.terminate()?;
    Ok(())
}

/// The device named on the command line, else the configured or default one.
fn select_device<B: Backend>(
    pm: &PortMidi<B>,
    config: &PortConfig,
    arg: Option<&String>,
    direction: Direction,
) -> Result<DeviceId> {
    if let Some(arg) = arg {
        let id: i32 = arg
            .parse()
            .map_err(|_| anyhow!("Invalid device number: {}", arg))?;
        return Ok(DeviceId(id));
    }
    let resolved = match direction {
        Direction::Input => config.resolve_input(pm),
        Direction::Output => config.resolve_output(pm),
    };
    resolved.context("No device given and none configured (see --list-devices)")
}

fn main() -> Result<()> {
    let mut verbosity = 0;
    let mut config_path = None;
    let mut args = Vec::new();

    let mut raw = env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "-v" => verbosity += 1,
            "-vv" => verbosity += 2,
            "--config" => {
                config_path = Some(raw.next().ok_or_else(|| anyhow!("--config requires a file"))?)
            }
            _ => args.push(arg),
        }
    }

    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match config_path {
        Some(path) => PortConfig::load(&path)?,
        None => PortConfig::default(),
    };

    let Some(command) = args.first() else {
        println!("pmbridge - PortMidi device bridge");
        println!("Run with --help for usage information");
        return Ok(());
    };

    match command.as_str() {
        "--list-devices" => {
            let pm = PortMidi::initialize(native_backend())?;
            list_devices(&pm)?;
            pm.terminate()?;
        }
        "--monitor" => {
            let seconds = match args.get(2) {
                Some(s) => s.parse().map_err(|_| anyhow!("Invalid duration: {}", s))?,
                None => 30,
            };
            let pm = PortMidi::initialize(native_backend())?;
            let device = select_device(&pm, &config, args.get(1), Direction::Input)?;
            monitor_input(&pm, &config, device, seconds)?;
            pm.terminate()?;
        }
        "--test-note" => {
            let pm = PortMidi::initialize(native_backend())?;
            let device = select_device(&pm, &config, args.get(1), Direction::Output)?;
            send_test_note(&pm, &config, device)?;
            pm.terminate()?;
        }
        "--loopback-demo" => {
            loopback_demo(&config)?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        other => {
            eprintln!("Unknown option: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> PortMidi<Loopback> {
        PortMidi::initialize(Loopback::new().with_port("Keys").with_port("Drums")).unwrap()
    }

    #[test]
    fn test_explicit_device_wins() {
        let pm = session();
        let config = PortConfig {
            input_device: Some("drums".to_string()),
            ..PortConfig::default()
        };
        let arg = "0".to_string();
        assert_eq!(
            select_device(&pm, &config, Some(&arg), Direction::Input).unwrap(),
            DeviceId(0)
        );
        let bad = "keys".to_string();
        assert!(select_device(&pm, &config, Some(&bad), Direction::Input).is_err());
    }

    #[test]
    fn test_configured_device_used_without_argument() {
        let pm = session();
        let config = PortConfig::from_yaml("input_device: drums\noutput_device: drums\n").unwrap();
        assert_eq!(
            select_device(&pm, &config, None, Direction::Input).unwrap(),
            DeviceId(2)
        );
        assert_eq!(
            select_device(&pm, &config, None, Direction::Output).unwrap(),
            DeviceId(3)
        );
    }

    #[test]
    fn test_default_device_used_without_argument_or_config() {
        let pm = session();
        let config = PortConfig::default();
        assert_eq!(
            select_device(&pm, &config, None, Direction::Input).unwrap(),
            DeviceId(0)
        );
        assert_eq!(
            select_device(&pm, &config, None, Direction::Output).unwrap(),
            DeviceId(1)
        );
    }

    #[test]
    fn test_unmatched_config_name_fails() {
        let pm = session();
        let config = PortConfig {
            output_device: Some("piano".to_string()),
            ..PortConfig::default()
        };
        assert!(select_device(&pm, &config, None, Direction::Output).is_err());
    }
}
