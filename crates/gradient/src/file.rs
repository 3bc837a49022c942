use serde::{Deserialize, Serialize};

use crate::{Palette, PaletteError, Rgb};

/// Palette as written in TOML, either as a standalone file or as one
/// `[[palettes]]` entry of the application config.
///
/// ```toml
/// name = "ember"
/// colors = ["#19071a", "#09012f", "#ffaa00"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaletteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub colors: Vec<Rgb>,
}

impl PaletteSpec {
    pub fn from_toml_str(input: &str) -> Result<Self, PaletteError> {
        let spec: PaletteSpec = toml::from_str(input)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), PaletteError> {
        if self.colors.is_empty() {
            return Err(PaletteError::Invalid(format!(
                "palette '{}' must list at least one colour",
                self.label()
            )));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(PaletteError::Invalid("palette name may not be empty".into()));
            }
        }
        Ok(())
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    pub fn into_palette(self) -> Result<Palette, PaletteError> {
        Palette::new(self.colors)
    }

    pub fn from_palette(name: Option<String>, palette: &Palette) -> Self {
        Self {
            name,
            colors: palette.colors().to_vec(),
        }
    }
}
