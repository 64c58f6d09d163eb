use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BemError, BemResult};

pub fn read_config_from_file<P: AsRef<Path>>(file_path: P) -> BemResult<Config> {
    let yaml = std::fs::read_to_string(file_path)?;
    Config::from_yaml(&yaml)
}

/// Pipeline configuration. Every key is optional in YAML and falls back to
/// its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub radiation_irf: RadiationIrfParameters,
    pub excitation_irf: ExcitationIrfParameters,
    pub state_space: StateSpaceParameters,
    /// Worker threads for the (i, j) loops, rayon default if unset
    pub n_threads: Option<usize>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> BemResult<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BemResult<()> {
        self.radiation_irf.validate()?;
        self.excitation_irf.validate()?;
        self.state_space.validate()?;
        if self.n_threads == Some(0) {
            return Err(BemError::Config("n_threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// Radiation damping IRF grid, time on `[0, t_end]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadiationIrfParameters {
    pub t_end: f64,
    pub n_t: usize,
    pub n_w: usize,
}

impl Default for RadiationIrfParameters {
    fn default() -> Self {
        Self {
            t_end: 100.,
            n_t: 1001,
            n_w: 1001,
        }
    }
}

impl RadiationIrfParameters {
    pub fn validate(&self) -> BemResult<()> {
        check_grid("radiation_irf", self.t_end, self.n_t, self.n_w)
    }
}

/// Excitation IRF grid, time on `[-t_length, t_length]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExcitationIrfParameters {
    pub t_length: f64,
    pub n_t: usize,
    pub n_w: usize,
}

impl Default for ExcitationIrfParameters {
    fn default() -> Self {
        Self {
            t_length: 100.,
            n_t: 1001,
            n_w: 1001,
        }
    }
}

impl ExcitationIrfParameters {
    pub fn validate(&self) -> BemResult<()> {
        check_grid("excitation_irf", self.t_length, self.n_t, self.n_w)
    }
}

/// Order search limits for the radiation state-space realization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateSpaceParameters {
    pub max_order: usize,
    pub r2_threshold: f64,
}

impl Default for StateSpaceParameters {
    fn default() -> Self {
        Self {
            max_order: 10,
            r2_threshold: 0.95,
        }
    }
}

impl StateSpaceParameters {
    pub fn validate(&self) -> BemResult<()> {
        if self.max_order < 2 {
            return Err(BemError::Config(format!(
                "state_space.max_order must be at least 2, got {}",
                self.max_order
            )));
        }
        if !(self.r2_threshold > 0. && self.r2_threshold <= 1.) {
            return Err(BemError::Config(format!(
                "state_space.r2_threshold must be in (0, 1], got {}",
                self.r2_threshold
            )));
        }
        Ok(())
    }
}

fn check_grid(section: &str, span: f64, n_t: usize, n_w: usize) -> BemResult<()> {
    if !(span > 0. && span.is_finite()) {
        return Err(BemError::Config(format!(
            "{section}: time span must be positive, got {span}"
        )));
    }
    if n_t < 2 {
        return Err(BemError::Config(format!(
            "{section}.n_t must be at least 2, got {n_t}"
        )));
    }
    if n_w < 2 {
        return Err(BemError::Config(format!(
            "{section}.n_w must be at least 2, got {n_w}"
        )));
    }
    Ok(())
}
