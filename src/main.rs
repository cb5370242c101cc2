use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use log::info;

use image_compare_panel::app::{AppConfig, AppState};
use image_compare_panel::BlendMode;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("image_compare_panel")
        .version("1.0")
        .about("Renders a split/blend comparison of two images into a panel")
        .arg(
            Arg::new("image_a")
                .short('a')
                .long("image-a")
                .action(ArgAction::Set)
                .value_name("FILE")
                .help("Primary image, revealed left of the split line"),
        )
        .arg(
            Arg::new("image_b")
                .short('b')
                .long("image-b")
                .action(ArgAction::Set)
                .value_name("FILE")
                .help("Secondary image, shown right of the split line"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .action(ArgAction::Set)
                .value_name("FILE")
                .help("Where to write the rendered panel")
                .default_value("compare.png"),
        )
        .arg(
            Arg::new("blend_mode")
                .short('m')
                .long("blend-mode")
                .action(ArgAction::Set)
                .value_name("MODE")
                .help("normal, difference, lighten, darken, screen or multiply"),
        )
        .arg(
            Arg::new("slider")
                .short('s')
                .long("slider")
                .action(ArgAction::Set)
                .value_name("FRACTION")
                .help("Split position between 0 and 1"),
        )
        .arg(
            Arg::new("drag_to")
                .long("drag-to")
                .action(ArgAction::Set)
                .value_name("X")
                .help("Drag the split line to this panel x coordinate"),
        )
        .arg(
            Arg::new("panel_size")
                .long("panel-size")
                .action(ArgAction::Set)
                .value_name("WIDTHxHEIGHT")
                .help("Resize the panel by hand (disables autosize)"),
        )
        .arg(
            Arg::new("reset")
                .long("reset")
                .action(ArgAction::SetTrue)
                .help("Reset panel size and split position"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .action(ArgAction::Set)
                .value_name("FILE")
                .help("Load the saved panel state from a JSON record"),
        )
        .arg(
            Arg::new("save_state")
                .long("save-state")
                .action(ArgAction::Set)
                .value_name("FILE")
                .help("Save the panel state into a JSON record"),
        )
        .arg(
            Arg::new("export_dir")
                .long("export-dir")
                .action(ArgAction::Set)
                .value_name("DIR")
                .help("Run the context menu actions, writing into DIR"),
        )
        .arg(
            Arg::new("export_at")
                .long("export-at")
                .action(ArgAction::Set)
                .value_name("XxY")
                .help("Pointer position used to pick the image to export"),
        )
        .arg(
            Arg::new("num_load_threads")
                .long("num-load-threads")
                .action(ArgAction::Set)
                .value_name("COUNT")
                .help("Number of threads to use for decoding images")
                .default_value("2"),
        )
        .arg(
            Arg::new("load_timeout")
                .long("load-timeout")
                .action(ArgAction::Set)
                .value_name("SECONDS")
                .help("How long to wait for images to decode")
                .default_value("30"),
        )
        .get_matches();

    let string = |id: &str| matches.get_one::<String>(id).cloned();

    let blend_mode = string("blend_mode")
        .map(|mode| mode.parse::<BlendMode>())
        .transpose()?;
    let slider = string("slider")
        .map(|v| v.parse::<f32>().map_err(|_| anyhow!("Invalid slider value '{}'", v)))
        .transpose()?;
    let drag_to = string("drag_to")
        .map(|v| v.parse::<f32>().map_err(|_| anyhow!("Invalid drag position '{}'", v)))
        .transpose()?;
    let panel_size = string("panel_size")
        .map(|v| parse_pair(&v))
        .transpose()?;
    let export_at = string("export_at").map(|v| parse_pair(&v)).transpose()?;
    let num_load_threads = string("num_load_threads")
        .and_then(|v| v.parse().ok())
        .unwrap_or(2);
    let load_timeout = string("load_timeout")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);

    let config = AppConfig {
        image_a: string("image_a"),
        image_b: string("image_b"),
        output: string("output").unwrap_or_else(|| "compare.png".to_string()),
        blend_mode,
        slider,
        drag_to,
        panel_size,
        reset: matches.get_flag("reset"),
        state_in: string("state"),
        state_out: string("save_state"),
        export_dir: string("export_dir"),
        export_at,
        num_load_threads,
        load_timeout: Duration::from_secs(load_timeout),
    };

    info!(
        "Starting image comparison with A: {:?}, B: {:?}",
        config.image_a, config.image_b
    );

    let mut app = AppState::new(config)?;
    app.run()
}

fn parse_pair(value: &str) -> Result<(f32, f32)> {
    let parts: Vec<&str> = value.split('x').collect();
    if parts.len() != 2 {
        return Err(anyhow!("Invalid format '{}'. Use AxB", value));
    }
    let first = parts[0]
        .parse::<f32>()
        .map_err(|_| anyhow!("Invalid number '{}'", parts[0]))?;
    let second = parts[1]
        .parse::<f32>()
        .map_err(|_| anyhow!("Invalid number '{}'", parts[1]))?;
    Ok((first, second))
}
