//! Shader sources compiled into the binary, addressed as `builtin:<name>`.

pub const VERTEX_SHADER: &str = include_str!("../shaders/vertex.glsl");
pub const FRAGMENT_SHADER: &str = include_str!("../shaders/fragment.glsl");

pub const PREFIX: &str = "builtin:";

/// Names accepted after the `builtin:` prefix.
pub const NAMES: [&str; 2] = ["vertex.glsl", "fragment.glsl"];

pub fn shader(name: &str) -> Option<&'static str> {
    match name {
        "vertex.glsl" => Some(VERTEX_SHADER),
        "fragment.glsl" => Some(FRAGMENT_SHADER),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_name_resolves() {
        for name in NAMES {
            assert!(shader(name).is_some(), "{name}");
        }
        assert!(shader("missing.glsl").is_none());
    }
}
