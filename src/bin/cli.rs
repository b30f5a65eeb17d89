use anyhow::{anyhow, bail, Context, Result};
use std::env;

fn main() -> Result<()> {
    vhdscan::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: vhdscan-cli <command> [args]");
        eprintln!("Commands: list-devices, probe, set-control, set-format, feed");
        std::process::exit(1);
    }

    run(&args)
}

#[cfg(not(target_os = "linux"))]
fn run(_args: &[String]) -> Result<()> {
    bail!("vhdscan-cli requires Linux (V4L2)")
}

#[cfg(target_os = "linux")]
fn run(args: &[String]) -> Result<()> {
    let config = vhdscan::VhdscanConfig::load_or_default();
    let command = &args[1];
    match command.as_str() {
        "list-devices" => cmd_list_devices(&config, args),
        "probe" => cmd_probe(&config, args),
        "set-control" => cmd_set_control(&config, args),
        "set-format" => cmd_set_format(&config, args),
        "feed" => cmd_feed(&config, args),
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

#[cfg(target_os = "linux")]
fn positional<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str> {
    const VALUED: [&str; 3] = ["--resolution", "--seconds", "--fps"];

    let mut values = Vec::new();
    let mut skip_next = false;
    for arg in args.iter().skip(2) {
        if skip_next {
            skip_next = false;
        } else if arg.starts_with("--") {
            skip_next = VALUED.contains(&arg.as_str());
        } else {
            values.push(arg.as_str());
        }
    }
    values
        .get(index)
        .copied()
        .ok_or_else(|| anyhow!("Usage: vhdscan-cli {}", usage))
}

#[cfg(target_os = "linux")]
fn option<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[cfg(target_os = "linux")]
fn cmd_list_devices(config: &vhdscan::VhdscanConfig, args: &[String]) -> Result<()> {
    let context = vhdscan::CameraContext::system(config);
    context.registry.refresh()?;
    let devices = context.registry.devices();

    if args.contains(&"--json".to_string()) {
        let list: Vec<serde_json::Value> = devices
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id(),
                    "name": d.name(),
                    "vendor": d.vendor(),
                    "model": d.model(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string(&list)?);
    } else {
        for d in devices {
            println!("{}: {} {} ({})", d.name(), d.vendor(), d.model(), d.id());
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn cmd_probe(config: &vhdscan::VhdscanConfig, args: &[String]) -> Result<()> {
    let device = positional(args, 0, "probe <device> [--json]")?;
    let tool = vhdscan::platform::V4l2Ctl::new(config.camera.control_tool.clone());
    let probed = vhdscan::probe::probe_device(&tool, device, None, None)
        .with_context(|| format!("Probing {} failed", device))?;

    if args.contains(&"--json".to_string()) {
        let value = serde_json::json!({
            "resolution": probed.resolution,
            "resolutions": probed.resolutions,
            "controls": probed.controls,
        });
        println!("{}", serde_json::to_string(&value)?);
    } else {
        println!("Current: {}", probed.resolution.label());
        for resolution in &probed.resolutions {
            println!("  {}", resolution.label());
        }
        for control in &probed.controls {
            let inactive = if control.is_inactive() { " (inactive)" } else { "" };
            println!("{} = {}{}", control.name(), control.value(), inactive);
            for option in control.options() {
                println!("    {}: {}", option.value, option.label);
            }
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn cmd_set_control(config: &vhdscan::VhdscanConfig, args: &[String]) -> Result<()> {
    use vhdscan::platform::ControlTool;

    let usage = "set-control <device> <name>=<value>";
    let device = positional(args, 0, usage)?;
    let assignment = positional(args, 1, usage)?;
    let (name, value) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Usage: vhdscan-cli {}", usage))?;
    let value: i64 = value
        .parse()
        .with_context(|| format!("Invalid control value: {}", value))?;

    let tool = vhdscan::platform::V4l2Ctl::new(config.camera.control_tool.clone());
    tool.set_control(device, name, value)?;
    println!("{} = {}", name, value);
    Ok(())
}

#[cfg(target_os = "linux")]
fn cmd_set_format(config: &vhdscan::VhdscanConfig, args: &[String]) -> Result<()> {
    use vhdscan::platform::ControlTool;

    let usage = "set-format <device> <WIDTHxHEIGHTxFORMAT>";
    let device = positional(args, 0, usage)?;
    let resolution: vhdscan::Resolution = positional(args, 1, usage)?.parse()?;

    let tool = vhdscan::platform::V4l2Ctl::new(config.camera.control_tool.clone());
    tool.set_format(device, &resolution)?;
    println!("{}", resolution.label());
    Ok(())
}

#[cfg(target_os = "linux")]
fn cmd_feed(config: &vhdscan::VhdscanConfig, args: &[String]) -> Result<()> {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use vhdscan::{Camera, CameraContext, CameraEvent, DeviceEvent};

    let device = positional(args, 0, "feed <device> [--resolution KEY] [--seconds N] [--fps N]")?;
    let resolution = option(args, "--resolution");
    let seconds: Option<u64> = option(args, "--seconds").map(str::parse).transpose()?;
    let fps: Option<u32> = option(args, "--fps").map(str::parse).transpose()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    let context = CameraContext::system(config);
    if let Some(fps) = fps {
        context.feed_slot.set_fps(fps);
    }
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(context.start_monitoring(config))?;

    let camera = Camera::new(&context, None);
    let events = camera.subscribe();
    camera.set_device_by_name(device, resolution, None)?;

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        while let Some(change) = runtime.block_on(context.registry.poll_event()) {
            match change {
                DeviceEvent::Connected(d) => println!("Connected: {}", d.display_name()),
                DeviceEvent::Disconnected(d) => println!("Disconnected: {}", d.display_name()),
            }
        }
        let Ok(event) = events.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        match event {
            CameraEvent::Ready => {
                println!("Ready: {}", camera.model_name(device));
                camera.start()?;
            }
            CameraEvent::Feed(frame) => {
                println!("Frame {}: {}x{}", frame.sequence, frame.width, frame.height);
            }
            CameraEvent::Error(code) => bail!("Camera error: {}", code),
            CameraEvent::Status(status) => log::debug!("Status: {}", status),
            _ => {}
        }
    }

    camera.stop();
    runtime.block_on(context.registry.stop_monitoring());
    println!("Dropped frames: {}", camera.dropped_frames());
    Ok(())
}
