pub mod config;
pub mod error;
pub mod hydro;
pub mod interp;
pub mod irf;
pub mod pipeline;
pub mod progress;
pub mod quadrature;
pub mod state_space;
pub mod util;

pub use error::{BemError, BemResult};
pub use hydro::HydrodynamicData;
