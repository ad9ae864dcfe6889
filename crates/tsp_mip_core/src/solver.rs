use std::{sync::Arc, time::Instant};

use crate::{
    Result,
    engine::{MipEngine, SolveParams, VarValues},
    io::{input::TspInstance, options::SolverOptions},
    model::{self, BuiltModel, FormulationKind},
    report::RunReport,
    tour::Tour,
};

/// Build the selected formulation, run the engine, and decode whatever
/// assignment came back into a report.
#[tsp_mip_derive::timer("solve")]
pub fn solve_instance(
    engine: &mut dyn MipEngine,
    instance: &TspInstance,
    options: &SolverOptions,
) -> Result<RunReport> {
    let started = Instant::now();

    let model = model::build_model(engine, &instance.matrix, options)?;
    if let Some(handler) = &model.separation {
        engine.set_separation(Arc::clone(handler));
    }

    let params = SolveParams {
        time_limit: options.time_limit_duration(),
        threads: options.threads.max(1),
    };
    log::info!(
        "solve: start instance={} n={} formulation={} time_limit_s={:.0} threads={}",
        instance.name,
        instance.n(),
        model.kind,
        options.time_limit,
        params.threads
    );

    let outcome = engine.optimize(&params)?;
    log::info!(
        "solve: done status={} nodes={} lazy_cuts={} cutting_planes={}",
        outcome.status,
        outcome.stats.nodes_explored,
        outcome.stats.lazy_cuts,
        outcome.stats.cutting_planes
    );

    // Decode whenever values exist; a time-limited incumbent is still a
    // reportable tour.
    let tour = match &outcome.solution {
        Some(values) => Some(decode_tour(&model, values)?),
        None => None,
    };

    let mut report = RunReport::new(
        instance.name.clone(),
        outcome.status,
        started.elapsed(),
        outcome.stats,
    );
    if let Some(objective) = outcome.objective {
        report = report.with_objective(objective);
    }
    if let Some(tour) = tour {
        report = report.with_tour(tour);
    }
    Ok(report)
}

fn decode_tour(model: &BuiltModel, values: &dyn VarValues) -> Result<Tour> {
    match model.kind {
        FormulationKind::TimeIndexedFlow => Tour::decode_layered(&model.vars, values),
        FormulationKind::Sequential | FormulationKind::SingleCommodityFlow => {
            Tour::decode(&model.vars, values)
        }
    }
}
