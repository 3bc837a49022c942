mod cli;
mod config;
mod fetch;
mod paths;
mod run;

use anyhow::{Context, Result};
use cli::{Command, PaletteArgs};
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Palette(args)) => run_palette(&cli.run, args),
        Some(Command::Paths) => run_paths(&cli.run),
        None => run::run(cli.run),
    }
}

fn run_palette(run_args: &cli::RunArgs, args: PaletteArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = run::load_config(&paths, run_args.config.as_deref())?;
    let palette_file = args.palette.as_deref().or(run_args.palette.as_deref());
    let palettes = run::resolve_palettes(&config, palette_file)?;

    for (index, entry) in palettes.iter().enumerate() {
        let marker = if index == 0 { "*" } else { " " };
        println!(
            "{marker} {:<16} {} colours: {}",
            entry.name,
            entry.palette.len(),
            entry.palette.to_hex().join(" ")
        );
    }

    if let Some(path) = &args.dump {
        let Some(active) = palettes.first() else {
            return Ok(());
        };
        let image = active.palette.encode();
        image
            .save_png(path)
            .with_context(|| format!("failed to write palette texture to {}", path.display()))?;
        println!(
            "Wrote {}x{} palette texture to {}",
            image.width(),
            image.height(),
            path.display()
        );
    }
    Ok(())
}

fn run_paths(run_args: &cli::RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config_file = run_args
        .config
        .clone()
        .unwrap_or_else(|| paths.config_file());
    println!("Configuration:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!(
        "  config file: {} ({})",
        config_file.display(),
        if config_file.exists() {
            "present"
        } else {
            "missing"
        }
    );
    println!("Built-in shaders:");
    for name in renderer::builtin::NAMES {
        println!("  {}{name}", renderer::builtin::PREFIX);
    }
    Ok(())
}
