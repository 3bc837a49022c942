use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use gradient::{Palette, PaletteSpec};
use renderer::{HostMode, NamedPalette, Renderer, RendererConfig, Resolution};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved huefield paths");
    let config = load_config(&paths, args.config.as_deref())?;

    let mut fetcher = Fetcher::new();
    let renderer_config = build_renderer_config(&args, &config, &mut fetcher)?;
    tracing::info!(
        resolution = renderer_config.resolution.pixels(),
        fps = renderer_config.target_fps,
        palettes = renderer_config.palettes.len(),
        headless = args.headless,
        "starting huefield"
    );

    let summary = Renderer::new(renderer_config)
        .run()
        .context("renderer exited with an error")?;

    if args.headless {
        match summary.stats {
            Some(stats) => println!(
                "Rendered {} frames (FPS: {} MSPT: {})",
                summary.frames_rendered, stats.fps, stats.mspt
            ),
            None => println!("Rendered {} frames", summary.frames_rendered),
        }
        if let Some(path) = &args.capture {
            println!("Captured last frame to {}", path.display());
        }
    }
    Ok(())
}

/// Reads `explicit` when given, otherwise the default config file if it
/// exists.
pub fn load_config(paths: &AppPaths, explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            Config::load_or_default(path)
        }
        None => Config::load_or_default(&paths.config_file()),
    }
}

/// Fetches both shader stages and layers CLI flags over the config file.
pub fn build_renderer_config(
    args: &RunArgs,
    config: &Config,
    fetcher: &mut Fetcher,
) -> Result<RendererConfig> {
    let vertex_location = args.vertex.as_deref().unwrap_or(&config.vertex);
    let fragment_location = args.fragment.as_deref().unwrap_or(&config.fragment);

    let vertex = fetcher
        .fetch(vertex_location)
        .with_context(|| format!("failed to load vertex shader from {vertex_location}"))?;
    let fragment = fetcher
        .fetch(fragment_location)
        .with_context(|| format!("failed to load fragment shader from {fragment_location}"))?;

    let mut renderer_config = RendererConfig::new(vertex, fragment);
    renderer_config.palettes = resolve_palettes(config, args.palette.as_deref())?;
    renderer_config.resolution =
        Resolution::from_slider(args.resolution.unwrap_or(config.resolution))?;
    renderer_config.target_fps = args.fps.unwrap_or(config.fps);
    renderer_config.render_mode = args.render_mode.unwrap_or(config.render_mode);
    renderer_config.mode = if args.headless {
        HostMode::Headless {
            frames: args.frames,
            capture: args.capture.clone(),
        }
    } else {
        HostMode::Windowed
    };
    Ok(renderer_config)
}

/// Palette cycle order: `--palette` file first, then configured palettes,
/// falling back to the built-in gradient when both are absent.
pub fn resolve_palettes(config: &Config, palette_file: Option<&Path>) -> Result<Vec<NamedPalette>> {
    let mut palettes = Vec::new();
    if let Some(path) = palette_file {
        palettes.push(load_palette_file(path)?);
    }
    palettes.extend(config.named_palettes()?);
    if palettes.is_empty() {
        palettes.push(NamedPalette::new("default", Palette::default_gradient()));
    }
    Ok(palettes)
}

fn load_palette_file(path: &Path) -> Result<NamedPalette> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read palette file {}", path.display()))?;
    let spec = PaletteSpec::from_toml_str(&contents)
        .with_context(|| format!("failed to parse palette file {}", path.display()))?;
    let name = spec.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "palette".to_string())
    });
    let palette = spec
        .into_palette()
        .with_context(|| format!("palette file {} is invalid", path.display()))?;
    Ok(NamedPalette::new(name, palette))
}
