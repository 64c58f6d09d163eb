use log::info;

use crate::config::Config;
use crate::error::{BemError, BemResult};
use crate::hydro::HydrodynamicData;

/// Runs radiation IRF, excitation IRF (when excitation data is present) and
/// radiation state-space reduction on a dedicated thread pool.
pub fn run(data: &mut HydrodynamicData, config: &Config) -> BemResult<()> {
    config.validate()?;
    let pool = thread_pool(config.n_threads)?;
    info!(
        "Processing {} with {} worker threads",
        data.name(),
        pool.current_num_threads()
    );

    pool.install(|| {
        data.calc_irf_radiation(&config.radiation_irf)?;
        if data.ex.is_populated() {
            data.calc_irf_excitation(&config.excitation_irf)?;
        } else {
            info!("No excitation coefficients for {}, skipping", data.name());
        }
        data.calc_ss_radiation(&config.state_space)
    })
}

fn thread_pool(n_threads: Option<usize>) -> BemResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = n_threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| BemError::Config(format!("unable to build thread pool: {}", e)))
}
