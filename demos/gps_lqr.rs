use std::error::Error;

extern crate guided_policy_search;
use guided_policy_search::control::{Gps, GpsConfig};
use guided_policy_search::data::{save_gaussian_sequence, save_trace};
use guided_policy_search::envs::LinearQuadraticEnv;
use guided_policy_search::utils::plot::plot_trace;

fn main() -> Result<(), Box<dyn Error>> {
    let config = GpsConfig {
        nb_steps: 25,
        nb_episodes: 50,
        nb_iter: 8,
        kl_bound: 5.0,
        init_action_sigma: 0.5,
        verbose: true,
        ..GpsConfig::default()
    };

    let mut solver: Gps<_, 1, 1> = Gps::new(LinearQuadraticEnv::scalar(), config);
    let trace = solver.run();

    println!("final mean return: {:.4}", trace.last().unwrap());
    for (iter, err) in &solver.diagnostics {
        println!("iteration {iter}: {err}");
    }

    std::fs::create_dir_all("./img")?;
    save_trace(&trace, "./img/gps_lqr_trace.csv")?;
    save_gaussian_sequence(&solver.prop.xdist, "./img/gps_lqr_states.csv")?;
    plot_trace(&trace, "./img/gps_lqr_trace.svg")?;
    Ok(())
}
