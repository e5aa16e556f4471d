//! JSON particle files.
//!
//! A snapshot file is a JSON array of particle records:
//!
//! ```json
//! [
//!   { "id": 1, "position": [0.0, 0.0, 0.0], "velocity": [0.0, 0.0, 0.0],
//!     "mass": 1.0, "smoothing_length": 0.1, "internal_energy": 1e-4,
//!     "density": 12.5 },
//!   ...
//! ]
//! ```
//!
//! `smoothing_length`, `internal_energy`, `density` and `potential` may be
//! omitted.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use cloudphinder::{CloudError, Particle, ParticleSet, ParticleSource};

/// A particle snapshot stored as JSON on disk
#[derive(Debug, Clone)]
pub struct JsonSnapshot {
    path: PathBuf,
    softening: f64,
}

impl JsonSnapshot {
    pub fn new(path: impl Into<PathBuf>, softening: f64) -> Self {
        Self {
            path: path.into(),
            softening,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ParticleSource for JsonSnapshot {
    /// The snapshot path, unique per input file
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<ParticleSet, CloudError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let particles: Vec<Particle> = serde_json::from_reader(reader)?;
        Ok(ParticleSet::from_particles(&particles, self.softening))
    }
}
