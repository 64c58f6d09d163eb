use std::{env, fs::File, io::Write};

use itertools::Itertools;
use ndarray::{Array2, Array3};

use bemio::{
    config::{read_config_from_file, Config},
    pipeline,
    util::linspace,
    BemResult, HydrodynamicData,
};

fn main() -> BemResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional YAML configuration as the first argument
    let config = match env::args().nth(1) {
        Some(path) => read_config_from_file(path)?,
        None => Config::default(),
    };

    //--------------------------------------------------------------------------
    // Synthetic floating body
    //--------------------------------------------------------------------------

    // BEM codes usually write frequencies in descending order
    let n_w = 200;
    let w = linspace(4., 0.02, n_w);
    let mut hd = HydrodynamicData::new("synthetic_spar", 1, w.clone());
    hd.body_num = Some(0);
    hd.bem_code = Some("synthetic".to_string());
    hd.cg = Some([0., 0., -5.]);
    hd.cb = Some([0., 0., -10.]);
    hd.disp_vol = Some(1200.);

    // Peaked damping spectra on the diagonal with a surge-pitch coupling
    let peak = [1.2, 1.2, 0.9, 0.6, 0.6, 1.5];
    let scale = [2e5, 2e5, 5e5, 1e7, 1e7, 1e6];
    let spectrum = |i: usize, wk: f64| {
        let x = wk / peak[i];
        scale[i] * x * x * (-x * x).exp()
    };
    let mut rd = Array3::<f64>::zeros((6, 6, n_w));
    for (k, &wk) in w.iter().enumerate() {
        for i in 0..6 {
            rd[[i, i, k]] = spectrum(i, wk);
        }
        rd[[0, 4, k]] = -0.05 * spectrum(0, wk);
        rd[[4, 0, k]] = -0.05 * spectrum(0, wk);
    }
    hd.rd.all = Some(rd);
    hd.am.inf = Some(Array2::from_diag(&ndarray::arr1(&[
        1e6, 1e6, 2e5, 5e8, 5e8, 1e7,
    ])));

    // Head seas excitation in magnitude and phase form
    hd.ex.mag = Some(Array3::from_shape_fn((6, 1, n_w), |(i, _, k)| {
        scale[i] * (-0.5 * w[k]).exp()
    }));
    hd.ex.phase = Some(Array3::from_shape_fn((6, 1, n_w), |(_, _, k)| {
        -w[k] * w[k] * 10. / 9.81
    }));

    println!("{}", hd);

    //--------------------------------------------------------------------------
    // Time domain coefficients
    //--------------------------------------------------------------------------

    pipeline::run(&mut hd, &config)?;

    let irf = hd.rd.irf()?;
    let ss = hd.rd.ss()?;

    let mut file = File::create("synthetic_body_irf.csv")?;
    for (it, t) in irf.t.iter().enumerate() {
        writeln!(
            file,
            "{},{}",
            t,
            (0..6).map(|i| irf.k[[i, i, it]]).join(",")
        )?;
    }

    println!("{:>4} {:>4} {:>6} {:>10}  status", "i", "j", "order", "R2");
    for i in 0..ss.n_rows {
        for j in 0..ss.n_cols {
            let Some(pr) = ss.pair(i, j) else { continue };
            if pr.order == 0 {
                continue;
            }
            println!(
                "{:>4} {:>4} {:>6} {:>10.6}  {:?}",
                i, j, pr.order, pr.r2, pr.status
            );
        }
    }

    Ok(())
}
