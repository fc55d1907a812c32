use std::path::Path;

use serde::Deserialize;

use crate::request::{Broadphase, Initialize, Vector};

/// Where the solver runs.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub enum SolverBackend {
    /// A solver thread inside this process.
    #[default]
    Worker,
    /// A `physics` server reached over TCP.
    Server {
        compress: Option<u32>,
        address: String,
    },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broadphase: Broadphase,
    pub gravity: Vector,
    pub backend: SolverBackend,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            broadphase: Broadphase::Sap,
            gravity: Vector { x: 0.0, y: -9.8, z: 0.0 },
            backend: SolverBackend::Worker,
        }
    }
}

impl Settings {
    pub fn from_ron(source: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::from_ron(&source)?)
    }

    pub fn initialize(&self) -> Initialize {
        Initialize {
            broadphase: Some(self.broadphase),
            gravity: Some(self.gravity),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not read settings, {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse settings, {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_use_defaults() {
        let settings = Settings::from_ron("()").unwrap();
        assert_eq!(settings, Settings::default());

        let initialize = settings.initialize();
        assert_eq!(initialize.broadphase, Some(Broadphase::Sap));
        assert_eq!(initialize.gravity, Some(Vector { x: 0.0, y: -9.8, z: 0.0 }));
    }

    #[test]
    fn server_backend_parses() {
        let settings = Settings::from_ron(
            r#"(
                broadphase: naive,
                gravity: (x: 0.0, y: -1.6, z: 0.0),
                backend: Server(compress: Some(6), address: "127.0.0.1:4000"),
            )"#,
        )
        .unwrap();

        assert_eq!(settings.broadphase, Broadphase::Naive);
        assert_eq!(settings.gravity.y, -1.6);
        assert_eq!(
            settings.backend,
            SolverBackend::Server { compress: Some(6), address: "127.0.0.1:4000".to_string() }
        );
    }
}
