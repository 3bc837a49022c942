use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use gradient::PaletteSpec;
use renderer::{builtin, NamedPalette, Resolution, SLIDER_RANGE};
use scheduler::DEFAULT_TARGET_FPS;
use serde::{Deserialize, Serialize};

/// Contents of `huefield.toml`. Every key is optional; a missing file is
/// the same as an empty one.
///
/// ```toml
/// vertex = "builtin:vertex.glsl"
/// fragment = "~/shaders/julia.frag"
/// resolution = 80
/// fps = 60
/// render_mode = false
///
/// [[palettes]]
/// name = "ember"
/// colors = ["#19071a", "#09012f", "#ffaa00"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub vertex: String,
    pub fragment: String,
    pub resolution: u32,
    pub fps: f32,
    pub render_mode: bool,
    pub palettes: Vec<PaletteSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vertex: format!("{}{}", builtin::PREFIX, builtin::NAMES[0]),
            fragment: format!("{}{}", builtin::PREFIX, builtin::NAMES[1]),
            resolution: Resolution::default().slider(),
            fps: DEFAULT_TARGET_FPS,
            render_mode: true,
            palettes: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file at {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file at {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vertex.trim().is_empty() || self.fragment.trim().is_empty() {
            bail!("shader locations must not be empty");
        }
        if !SLIDER_RANGE.contains(&self.resolution) {
            bail!(
                "resolution {} is outside {}..={}",
                self.resolution,
                SLIDER_RANGE.start(),
                SLIDER_RANGE.end()
            );
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            bail!("fps must be a positive number, got {}", self.fps);
        }
        for spec in &self.palettes {
            spec.validate()?;
        }
        Ok(())
    }

    /// Configured palettes in file order, labelled `palette-N` when unnamed.
    pub fn named_palettes(&self) -> Result<Vec<NamedPalette>> {
        self.palettes
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let name = spec
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("palette-{}", index + 1));
                let palette = spec
                    .clone()
                    .into_palette()
                    .with_context(|| format!("palette '{name}' is invalid"))?;
                Ok(NamedPalette::new(name, palette))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_or_default(&dir.path().join("huefield.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.vertex, "builtin:vertex.glsl");
        assert_eq!(config.fragment, "builtin:fragment.glsl");
        assert_eq!(config.resolution, 50);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huefield.toml");
        fs::write(
            &path,
            r##"
fragment = "shaders/julia.frag"
render_mode = false

[[palettes]]
name = "ember"
colors = ["#19071a", "#ffaa00"]

[[palettes]]
colors = ["000000"]
"##,
        )
        .unwrap();

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.fragment, "shaders/julia.frag");
        assert_eq!(config.vertex, "builtin:vertex.glsl");
        assert!(!config.render_mode);

        let palettes = config.named_palettes().unwrap();
        assert_eq!(palettes.len(), 2);
        assert_eq!(palettes[0].name, "ember");
        assert_eq!(palettes[0].palette.len(), 2);
        assert_eq!(palettes[1].name, "palette-2");
    }

    #[test]
    fn rejects_out_of_range_resolution() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huefield.toml");
        fs::write(&path, "resolution = 0\n").unwrap();
        let err = Config::load_or_default(&path).unwrap_err();
        assert!(format!("{err:#}").contains("resolution 0"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huefield.toml");
        fs::write(&path, "shader = \"x\"\n").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }

    #[test]
    fn malformed_palette_colour_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huefield.toml");
        fs::write(&path, "[[palettes]]\ncolors = [\"#12345\"]\n").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }
}
