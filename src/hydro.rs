use std::borrow::Cow;
use std::fmt;

use ndarray::{Array2, Array3, Zip};

use crate::error::{BemError, BemResult};
use crate::irf::{ExcitationIrf, RadiationIrf};
use crate::state_space::StateSpaceRealization;

/// Returns the value of an optional field or an error naming it.
pub(crate) fn required<'a, T>(value: &'a Option<T>, name: &'static str) -> BemResult<&'a T> {
    value.as_ref().ok_or(BemError::UninitializedField(name))
}

/// Added mass coefficients
#[derive(Debug, Clone, Default)]
pub struct AddedMass {
    /// Frequency dependent added mass `[6][6*num_bodies][n_w]`
    pub all: Option<Array3<f64>>,
    /// Infinite frequency added mass `[6][6*num_bodies]`
    pub inf: Option<Array2<f64>>,
    /// Zero frequency added mass `[6][6*num_bodies]`
    pub zero: Option<Array2<f64>>,
}

impl AddedMass {
    pub fn all(&self) -> BemResult<&Array3<f64>> {
        required(&self.all, "am.all")
    }
    pub fn inf(&self) -> BemResult<&Array2<f64>> {
        required(&self.inf, "am.inf")
    }
    pub fn zero(&self) -> BemResult<&Array2<f64>> {
        required(&self.zero, "am.zero")
    }
}

/// Radiation damping coefficients and their time-domain representations
#[derive(Debug, Clone, Default)]
pub struct RadiationDamping {
    /// Frequency dependent radiation damping `[6][6*num_bodies][n_w]`
    pub all: Option<Array3<f64>>,
    /// Impulse response function
    pub irf: Option<RadiationIrf>,
    /// State-space realization of the impulse response function
    pub ss: Option<StateSpaceRealization>,
}

impl RadiationDamping {
    pub fn all(&self) -> BemResult<&Array3<f64>> {
        required(&self.all, "rd.all")
    }
    pub fn irf(&self) -> BemResult<&RadiationIrf> {
        required(&self.irf, "rd.irf")
    }
    pub fn ss(&self) -> BemResult<&StateSpaceRealization> {
        required(&self.ss, "rd.ss")
    }
}

/// Wave excitation force coefficients `[6][n_dir][n_w]`
#[derive(Debug, Clone, Default)]
pub struct Excitation {
    pub mag: Option<Array3<f64>>,
    pub phase: Option<Array3<f64>>,
    pub re: Option<Array3<f64>>,
    pub im: Option<Array3<f64>>,
    /// Impulse response function
    pub irf: Option<ExcitationIrf>,
}

impl Excitation {
    pub fn re(&self) -> BemResult<&Array3<f64>> {
        required(&self.re, "ex.re")
    }
    pub fn im(&self) -> BemResult<&Array3<f64>> {
        required(&self.im, "ex.im")
    }
    pub fn mag(&self) -> BemResult<&Array3<f64>> {
        required(&self.mag, "ex.mag")
    }
    pub fn phase(&self) -> BemResult<&Array3<f64>> {
        required(&self.phase, "ex.phase")
    }
    pub fn irf(&self) -> BemResult<&ExcitationIrf> {
        required(&self.irf, "ex.irf")
    }

    /// True if either a real/imaginary or magnitude/phase pair is present.
    pub fn is_populated(&self) -> bool {
        (self.re.is_some() && self.im.is_some()) || (self.mag.is_some() && self.phase.is_some())
    }

    /// Real and imaginary parts, derived from magnitude and phase when they
    /// were not provided directly.
    pub fn re_im(&self) -> BemResult<(Cow<'_, Array3<f64>>, Cow<'_, Array3<f64>>)> {
        if let (Some(re), Some(im)) = (&self.re, &self.im) {
            return Ok((Cow::Borrowed(re), Cow::Borrowed(im)));
        }
        let (mag, phase) = match (&self.mag, &self.phase) {
            (Some(m), Some(p)) => (m, p),
            _ if self.re.is_none() => return Err(BemError::UninitializedField("ex.re")),
            _ => return Err(BemError::UninitializedField("ex.im")),
        };
        if mag.shape() != phase.shape() {
            return Err(BemError::ShapeMismatch {
                what: "excitation phase",
                expected: mag.shape().to_vec(),
                got: phase.shape().to_vec(),
            });
        }
        let re = Zip::from(mag).and(phase).map_collect(|&m, &p| m * p.cos());
        let im = Zip::from(mag).and(phase).map_collect(|&m, &p| m * p.sin());
        Ok((Cow::Owned(re), Cow::Owned(im)))
    }
}

/// Hydrodynamic data for one body from a BEM simulation
#[derive(Debug, Clone)]
pub struct HydrodynamicData {
    /// Fluid density (kg/m^3)
    pub rho: f64,
    /// Gravitational acceleration (m/s^2)
    pub g: f64,
    /// Wave direction (deg)
    pub wave_dir: f64,
    /// Total number of bodies in the BEM run
    pub num_bodies: usize,

    /// Center of gravity (m)
    pub cg: Option<[f64; 3]>,
    /// Center of buoyancy (m)
    pub cb: Option<[f64; 3]>,
    /// Hydrostatic stiffness `[6][6]`
    pub k: Option<Array2<f64>>,
    /// Wave periods (s)
    pub t: Option<Vec<f64>>,
    /// Wave frequencies (rad/s), either ascending or descending
    pub w: Option<Vec<f64>>,

    /// Water plane area (m^2)
    pub wp_area: Option<f64>,
    /// Buoyancy force (N)
    pub buoy_force: Option<f64>,
    /// Displaced volume (m^3)
    pub disp_vol: Option<f64>,
    /// Water depth (m), `None` when infinite or unknown
    pub water_depth: Option<f64>,
    /// Body number within the BEM run
    pub body_num: Option<usize>,

    pub name: Option<String>,
    pub bem_code: Option<String>,

    pub am: AddedMass,
    pub rd: RadiationDamping,
    pub ex: Excitation,
}

impl Default for HydrodynamicData {
    fn default() -> Self {
        Self {
            rho: 1000.,
            g: 9.81,
            wave_dir: 0.,
            num_bodies: 0,
            cg: None,
            cb: None,
            k: None,
            t: None,
            w: None,
            wp_area: None,
            buoy_force: None,
            disp_vol: None,
            water_depth: None,
            body_num: None,
            name: None,
            bem_code: None,
            am: AddedMass::default(),
            rd: RadiationDamping::default(),
            ex: Excitation::default(),
        }
    }
}

impl HydrodynamicData {
    pub fn new(name: &str, num_bodies: usize, w: Vec<f64>) -> Self {
        Self {
            name: Some(name.to_string()),
            num_bodies,
            w: Some(w),
            ..Default::default()
        }
    }

    pub fn w(&self) -> BemResult<&[f64]> {
        required(&self.w, "w").map(|w| w.as_slice())
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("not defined")
    }

    /// Checks that a `[i][j][n_w]` coefficient array has the
    /// `6 x 6*num_bodies` radiation layout on the frequency grid.
    pub fn check_radiation_shape(&self, what: &'static str, c: &Array3<f64>) -> BemResult<()> {
        let n_w = self.w()?.len();
        if self.num_bodies == 0 {
            return Err(BemError::UninitializedField("num_bodies"));
        }
        let expected = vec![6, 6 * self.num_bodies, n_w];
        if c.shape() != expected.as_slice() {
            return Err(BemError::ShapeMismatch {
                what,
                expected,
                got: c.shape().to_vec(),
            });
        }
        Ok(())
    }
}

fn fmt_opt<T: fmt::Debug>(v: &Option<T>) -> String {
    match v {
        Some(v) => format!("{:?}", v),
        None => "not defined".to_string(),
    }
}

impl fmt::Display for HydrodynamicData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Body name: {}", self.name())?;
        writeln!(f, "    Body number: {}", fmt_opt(&self.body_num))?;
        writeln!(f, "    Total number of bodies: {}", self.num_bodies)?;
        writeln!(f, "    Displaced volume (m^3): {}", fmt_opt(&self.disp_vol))?;
        writeln!(f, "    Center of gravity (m): {}", fmt_opt(&self.cg))?;
        write!(f, "    Center of buoyancy (m): {}", fmt_opt(&self.cb))
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_defaults() {
        let hd = HydrodynamicData::default();
        assert_eq!(hd.rho, 1000.);
        assert_eq!(hd.g, 9.81);
        assert_eq!(hd.wave_dir, 0.);
        assert_eq!(hd.num_bodies, 0);
        assert_eq!(hd.name(), "not defined");
    }

    #[test]
    fn test_uninitialized_fields() {
        let hd = HydrodynamicData::default();
        assert!(matches!(hd.w(), Err(BemError::UninitializedField("w"))));
        assert!(matches!(
            hd.rd.all(),
            Err(BemError::UninitializedField("rd.all"))
        ));
        assert!(matches!(
            hd.rd.irf(),
            Err(BemError::UninitializedField("rd.irf"))
        ));
        assert!(matches!(
            hd.am.inf(),
            Err(BemError::UninitializedField("am.inf"))
        ));
        assert!(matches!(
            hd.ex.re_im(),
            Err(BemError::UninitializedField("ex.re"))
        ));
    }

    #[test]
    fn test_re_im_from_mag_phase() {
        let ex = Excitation {
            mag: Some(Array3::from_elem((1, 1, 2), 2.)),
            phase: Some(Array3::from_shape_vec((1, 1, 2), vec![0., PI / 2.]).unwrap()),
            ..Default::default()
        };
        assert!(ex.is_populated());
        let (re, im) = ex.re_im().unwrap();
        assert_relative_eq!(re[[0, 0, 0]], 2.);
        assert_relative_eq!(im[[0, 0, 0]], 0.);
        assert_relative_eq!(re[[0, 0, 1]], 0., epsilon = 1e-15);
        assert_relative_eq!(im[[0, 0, 1]], 2.);
    }

    #[test]
    fn test_re_im_prefers_direct_values() {
        let ex = Excitation {
            re: Some(Array3::from_elem((1, 1, 2), 1.)),
            im: Some(Array3::from_elem((1, 1, 2), -1.)),
            mag: Some(Array3::from_elem((1, 1, 2), 5.)),
            phase: Some(Array3::from_elem((1, 1, 2), 0.)),
            ..Default::default()
        };
        let (re, im) = ex.re_im().unwrap();
        assert!(matches!(re, Cow::Borrowed(_)));
        assert_eq!(re[[0, 0, 1]], 1.);
        assert_eq!(im[[0, 0, 1]], -1.);
    }

    #[test]
    fn test_check_radiation_shape() {
        let mut hd = HydrodynamicData::new("float", 2, vec![0.1, 0.2, 0.3]);
        assert!(hd
            .check_radiation_shape("rd.all", &Array3::zeros((6, 12, 3)))
            .is_ok());
        assert!(matches!(
            hd.check_radiation_shape("rd.all", &Array3::zeros((6, 6, 3))),
            Err(BemError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            hd.check_radiation_shape("rd.all", &Array3::zeros((6, 12, 2))),
            Err(BemError::ShapeMismatch { .. })
        ));

        // The body count is required, not inferred from the array
        hd.num_bodies = 0;
        assert!(matches!(
            hd.check_radiation_shape("rd.all", &Array3::zeros((1, 1, 3))),
            Err(BemError::UninitializedField("num_bodies"))
        ));
    }

    #[test]
    fn test_display() {
        let mut hd = HydrodynamicData::new("spar", 1, vec![]);
        hd.body_num = Some(0);
        hd.disp_vol = Some(120.5);
        let s = hd.to_string();
        assert!(s.starts_with("Body name: spar"));
        assert!(s.contains("Displaced volume (m^3): 120.5"));
        assert!(s.contains("Center of gravity (m): not defined"));
    }
}
