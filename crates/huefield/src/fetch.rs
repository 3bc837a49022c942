use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use renderer::builtin;
use reqwest::blocking::Client;
use tracing::debug;

/// Where shader text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Builtin(String),
    Remote(String),
    File(PathBuf),
}

impl Location {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("shader location must not be empty"));
        }
        if let Some(name) = trimmed.strip_prefix(builtin::PREFIX) {
            return Ok(Self::Builtin(name.to_string()));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(Self::Remote(trimmed.to_string()));
        }
        Ok(Self::File(expand_home(trimmed)))
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Resolves shader locations to source text. The HTTP client is only built
/// once a remote location is actually requested.
#[derive(Default)]
pub struct Fetcher {
    http: Option<Client>,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch(&mut self, raw: &str) -> Result<String> {
        match Location::parse(raw)? {
            Location::Builtin(name) => builtin::shader(&name)
                .map(str::to_string)
                .ok_or_else(|| {
                    anyhow!(
                        "unknown builtin shader '{name}' (available: {})",
                        builtin::NAMES.join(", ")
                    )
                }),
            Location::Remote(url) => self.fetch_remote(&url),
            Location::File(path) => fs::read_to_string(&path)
                .with_context(|| format!("failed to read shader source {}", path.display())),
        }
    }

    fn fetch_remote(&mut self, url: &str) -> Result<String> {
        let http = match &self.http {
            Some(client) => client.clone(),
            None => {
                let client = Client::builder()
                    .build()
                    .context("failed to build HTTP client")?;
                self.http = Some(client.clone());
                client
            }
        };
        debug!(%url, "fetching shader source");
        let response = http
            .get(url)
            .send()
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("shader request to {url} failed"))?;
        response
            .text()
            .with_context(|| format!("reading shader body from {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn classifies_locations() {
        assert_eq!(
            Location::parse("builtin:fragment.glsl").unwrap(),
            Location::Builtin("fragment.glsl".into())
        );
        assert_eq!(
            Location::parse("https://example.org/a.frag").unwrap(),
            Location::Remote("https://example.org/a.frag".into())
        );
        assert_eq!(
            Location::parse(" shaders/a.frag ").unwrap(),
            Location::File(PathBuf::from("shaders/a.frag"))
        );
        assert!(Location::parse("  ").is_err());
    }

    #[test]
    fn fetches_builtin_and_file_sources() {
        let mut fetcher = Fetcher::new();
        let vertex = fetcher.fetch("builtin:vertex.glsl").unwrap();
        assert_eq!(vertex, builtin::VERTEX_SHADER);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.frag");
        fs::write(&path, "void main() {}\n").unwrap();
        let text = fetcher.fetch(path.to_str().unwrap()).unwrap();
        assert_eq!(text, "void main() {}\n");
        assert!(fetcher.http.is_none());
    }

    #[test]
    fn unknown_builtin_and_missing_file_fail() {
        let mut fetcher = Fetcher::new();
        let err = fetcher.fetch("builtin:nope.glsl").unwrap_err();
        assert!(err.to_string().contains("vertex.glsl"));

        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.frag");
        assert!(fetcher.fetch(missing.to_str().unwrap()).is_err());
    }
}
