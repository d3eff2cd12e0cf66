//! Mold loading
//!
//! Molds are `.npy` files holding 2-D dB power arrays, either `f64` or `f32`.

use crate::config::{MoldSpec, SynthConfig};
use crate::packet::Packet;
use crate::Result;
use anyhow::{Context, anyhow};
use ndarray::Array2;
use ndarray_npy::read_npy;
use std::collections::BTreeMap;
use std::path::Path;

/// Load one mold as `f64`
pub fn load_mold<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    if let Ok(data) = read_npy::<_, Array2<f64>>(path) {
        return Ok(data);
    }

    let data: Array2<f32> =
        read_npy(path).with_context(|| format!("Failed to load mold: {:?}", path))?;
    Ok(data.mapv(f64::from))
}

/// Loaded molds and backgrounds, by name
#[derive(Debug, Clone, Default)]
pub struct MoldLibrary {
    molds: BTreeMap<String, (MoldSpec, Array2<f64>)>,
    backgrounds: BTreeMap<String, Array2<f64>>,
}

impl MoldLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the backgrounds and the molds of the given classes
    pub fn load(config: &SynthConfig, categories: &[i32]) -> Result<Self> {
        let mut library = Self::new();

        for background in &config.backgrounds {
            let data = load_mold(&background.path)?;
            if data.dim() != (config.nlines, config.nfft) {
                return Err(anyhow!(
                    "Background {} is {:?}, expected {}x{}",
                    background.name,
                    data.dim(),
                    config.nlines,
                    config.nfft
                ));
            }
            library.add_background(&background.name, data);
        }

        for spec in config.molds.iter().filter(|m| categories.contains(&m.category)) {
            let data = load_mold(&spec.path)?;
            tracing::debug!("Loaded mold {} with shape {:?}", spec.name, data.dim());
            library.add_mold(spec.clone(), data);
        }

        tracing::info!(
            "Loaded {} backgrounds and {} molds",
            library.backgrounds.len(),
            library.molds.len()
        );
        Ok(library)
    }

    pub fn add_mold(&mut self, spec: MoldSpec, data: Array2<f64>) {
        self.molds.insert(spec.name.clone(), (spec, data));
    }

    pub fn add_background(&mut self, name: &str, data: Array2<f64>) {
        self.backgrounds.insert(name.to_string(), data);
    }

    pub fn mold(&self, name: &str) -> Option<&(MoldSpec, Array2<f64>)> {
        self.molds.get(name)
    }

    pub fn background(&self, name: &str) -> Option<&Array2<f64>> {
        self.backgrounds.get(name)
    }

    pub fn background_names(&self) -> impl Iterator<Item = &str> {
        self.backgrounds.keys().map(String::as_str)
    }

    /// Mold specs of one class, in name order
    pub fn molds_of(&self, category: i32) -> impl Iterator<Item = &MoldSpec> {
        self.molds
            .values()
            .map(|(spec, _)| spec)
            .filter(move |spec| spec.category == category)
    }

    /// Fresh packet instantiated from a mold
    pub fn packet(&self, name: &str) -> Result<Packet> {
        let (spec, data) = self
            .mold(name)
            .ok_or_else(|| anyhow!("Unknown mold: {}", name))?;
        Ok(Packet::new(data, spec.category, spec.var_length))
    }
}
