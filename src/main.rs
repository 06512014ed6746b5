/// voxel-sculpt command line
///
/// Runs a scripted sculpting session offscreen: builds the engine from the
/// configuration, stamps the brush once, orbits the camera for the first
/// quarter of the frames and writes the requested outputs. `--dry-run` records the GPU
/// command stream instead of touching a device.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec2;

use voxel_sculpt::config::DEFAULT_CONFIG_FILE;
use voxel_sculpt::{
    GpuBackend, PromptAnswer, RecordingBackend, SculptApp, SculptConfig, SessionScript,
    UnsavedPrompt, WgpuBackend,
};

const USAGE: &str = "usage: voxel-sculpt [--config FILE] [--frames N] [--load FILE] \
[--save-as FILE] [--screenshot PNG] [--render PNG] [--dry-run]";

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    frames: u32,
    load: Option<PathBuf>,
    save_as: Option<PathBuf>,
    screenshot: Option<PathBuf>,
    render: Option<PathBuf>,
    dry_run: bool,
}

fn parse_options() -> Result<Options> {
    let mut options = Options {
        frames: 120,
        ..Default::default()
    };
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        let mut value = || args.next().ok_or_else(|| anyhow!("{} needs a value\n{}", arg, USAGE));
        match arg.as_str() {
            "--config" => options.config = Some(value()?.into()),
            "--frames" => {
                options.frames = value()?.parse().context("--frames expects a number")?;
            }
            "--load" => options.load = Some(value()?.into()),
            "--save-as" => options.save_as = Some(value()?.into()),
            "--screenshot" => options.screenshot = Some(value()?.into()),
            "--render" => options.render = Some(value()?.into()),
            "--dry-run" => options.dry_run = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("unknown argument '{}'\n{}", other, USAGE),
        }
    }
    Ok(options)
}

/// Answers the unsaved-changes question from the command line flags
struct CommandLinePrompt {
    save_as: Option<PathBuf>,
}

impl UnsavedPrompt for CommandLinePrompt {
    fn ask(&mut self, title: &str) -> PromptAnswer {
        match self.save_as.take() {
            Some(path) => PromptAnswer::SaveAs(path),
            None => {
                log::warn!("Discarding unsaved edits to {}", title);
                PromptAnswer::Discard
            }
        }
    }
}

fn run(gpu: &dyn GpuBackend, config: SculptConfig, options: &Options) -> Result<()> {
    let config_path = options
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut app = SculptApp::new(gpu, config, Some(&config_path))
        .context("Failed to initialize the sculptor")?;

    let [width, height] = app.viewport().size();
    let centre = Vec2::new(width as f32 / 2.0, height as f32 / 2.0);
    let script = SessionScript {
        frames: options.frames,
        load: options.load.clone(),
        screenshot: options.screenshot.clone(),
        render: options.render.clone(),
    };

    let mut session = || -> Result<()> {
        for frame in 0..script.frames {
            app.frame(gpu, &script.input(frame, 1.0 / 60.0, centre))?;
        }
        Ok(())
    };
    let session = session();

    for message in app.messages().iter() {
        log::info!("{:?}: {}", message.level, message.text);
    }
    log::info!("{} after {} frames", app.title(), app.frame_count());

    let mut prompt = CommandLinePrompt {
        save_as: options.save_as.clone(),
    };
    app.shutdown(gpu, &mut prompt)?;
    session
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_options()?;
    let config = match &options.config {
        Some(path) => SculptConfig::load(path),
        None => SculptConfig::load_or_default(DEFAULT_CONFIG_FILE),
    }
    .context("Failed to load configuration")?;

    if options.dry_run {
        let gpu = RecordingBackend::new();
        run(&gpu, config, &options)?;
        log::info!("Recorded {} GPU commands", gpu.commands().len());
    } else {
        let gpu = WgpuBackend::new_headless().context("No usable GPU adapter")?;
        run(&gpu, config, &options)?;
    }
    Ok(())
}
