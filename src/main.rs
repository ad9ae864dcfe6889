use std::time::Instant;

use log::info;

use tsp_mip_core::{
    Error, ExhaustiveEngine, Result, RunReport, SolveStats, SolveStatus, SolverOptions,
    TspInstance, logging, solve_instance,
};

fn main() -> Result<()> {
    let now = Instant::now();
    let options = SolverOptions::from_args()?;
    logging::init_logger(&options)?;
    let instance = TspInstance::from_options(&options)?;

    info!("input: {instance}");
    info!("options: {options}");

    let mut engine = ExhaustiveEngine::new();
    let report = match solve_instance(&mut engine, &instance, &options) {
        Ok(report) => report,
        Err(Error::Engine(message)) => {
            // The run still answers with a Fail line before the error
            // surfaces.
            let report = RunReport::new(
                instance.name.clone(),
                SolveStatus::EngineFailure,
                now.elapsed(),
                SolveStats::default(),
            );
            println!("{report}");
            return Err(Error::Engine(message));
        }
        Err(other) => return Err(other),
    };

    println!("{report}");
    if options.trace_tour
        && let Some(tour) = report.tour()
    {
        for (from, to) in tour.arcs() {
            println!("city {from} -> city {to}");
        }
    }

    info!(
        "output: status={} time={:.2}s",
        report.status(),
        now.elapsed().as_secs_f32()
    );

    Ok(())
}
