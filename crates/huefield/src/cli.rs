use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::SLIDER_RANGE;

#[derive(Parser, Debug)]
#[command(
    name = "huefield",
    author,
    version,
    about = "Palette-driven real-time shader renderer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Config file to read instead of `<config dir>/huefield.toml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Vertex shader location (`builtin:NAME`, http(s) URL, or file path).
    #[arg(long, value_name = "LOC")]
    pub vertex: Option<String>,

    /// Fragment shader location (`builtin:NAME`, http(s) URL, or file path).
    #[arg(long, value_name = "LOC")]
    pub fragment: Option<String>,

    /// Palette TOML file applied at startup, ahead of configured palettes.
    #[arg(long, value_name = "FILE")]
    pub palette: Option<PathBuf>,

    /// Resolution slider (1-200); the surface is ten pixels per step.
    #[arg(long, value_name = "SLIDER", value_parser = parse_slider)]
    pub resolution: Option<u32>,

    /// Target ticks per second.
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<f32>,

    /// Initial render mode flag passed to the shader (`on` or `off`).
    #[arg(long, value_name = "on|off", value_parser = parse_switch)]
    pub render_mode: Option<bool>,

    /// Render offscreen instead of opening a window.
    #[arg(long)]
    pub headless: bool,

    /// Refresh signals to deliver in headless mode.
    #[arg(long, value_name = "N", default_value_t = 120, requires = "headless")]
    pub frames: u64,

    /// Write the last headless frame to this PNG path.
    #[arg(long, value_name = "PNG", requires = "headless")]
    pub capture: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the palette that would be applied at startup.
    Palette(PaletteArgs),
    /// Print resolved directories and the config file location.
    Paths,
}

#[derive(Parser, Debug)]
pub struct PaletteArgs {
    /// Palette TOML file; defaults to the first configured palette.
    #[arg(long, value_name = "FILE")]
    pub palette: Option<PathBuf>,

    /// Also write the encoded N x 1 palette texture as PNG.
    #[arg(long, value_name = "PNG")]
    pub dump: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_slider(value: &str) -> Result<u32, String> {
    let slider: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid resolution '{value}'; expected an integer"))?;
    if !SLIDER_RANGE.contains(&slider) {
        return Err(format!(
            "resolution {slider} is outside {}..={}",
            SLIDER_RANGE.start(),
            SLIDER_RANGE.end()
        ));
    }
    Ok(slider)
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid fps '{value}'"))?;
    if !fps.is_finite() || fps <= 0.0 {
        return Err("fps must be a positive number".to_string());
    }
    Ok(fps)
}

pub fn parse_switch(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slider_must_be_in_range() {
        assert_eq!(parse_slider("50"), Ok(50));
        assert_eq!(parse_slider(" 200 "), Ok(200));
        assert!(parse_slider("0").is_err());
        assert!(parse_slider("201").is_err());
        assert!(parse_slider("fifty").is_err());
    }

    #[test]
    fn fps_must_be_positive() {
        assert_eq!(parse_fps("30"), Ok(30.0));
        assert!(parse_fps("0").is_err());
        assert!(parse_fps("-5").is_err());
        assert!(parse_fps("inf").is_err());
    }

    #[test]
    fn switches_accept_on_and_off() {
        assert_eq!(parse_switch("ON"), Ok(true));
        assert_eq!(parse_switch("off"), Ok(false));
        assert!(parse_switch("maybe").is_err());
    }

    #[test]
    fn headless_flags_parse() {
        let cli = Cli::try_parse_from([
            "huefield",
            "--headless",
            "--frames",
            "10",
            "--render-mode",
            "off",
            "--resolution",
            "20",
        ])
        .unwrap();
        assert!(cli.run.headless);
        assert_eq!(cli.run.frames, 10);
        assert_eq!(cli.run.render_mode, Some(false));
        assert_eq!(cli.run.resolution, Some(20));
        assert!(cli.command.is_none());
    }

    #[test]
    fn capture_requires_headless() {
        assert!(Cli::try_parse_from(["huefield", "--capture", "out.png"]).is_err());
    }

    #[test]
    fn palette_subcommand_parses() {
        let cli = Cli::try_parse_from(["huefield", "palette", "--dump", "p.png"]).unwrap();
        match cli.command {
            Some(Command::Palette(args)) => {
                assert_eq!(args.dump, Some(PathBuf::from("p.png")));
                assert!(args.palette.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
