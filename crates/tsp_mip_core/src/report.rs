use std::{fmt, time::Duration};

use tsp_mip_derive::New;

use crate::{
    engine::{SolveStats, SolveStatus},
    tour::Tour,
};

const INTEGER_DISPLAY_TOLERANCE: f64 = 1e-9;

/// Outcome of one solve run. Displays as the single result line the
/// CLI prints: `Result: ...` when an objective exists (even under a
/// time limit), `Fail: ...` otherwise.
#[derive(Clone, Debug, New)]
pub struct RunReport {
    instance: String,
    status: SolveStatus,
    runtime: Duration,
    stats: SolveStats,
    objective: Option<f64>,
    tour: Option<Tour>,
}

impl RunReport {
    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn runtime(&self) -> Duration {
        self.runtime
    }

    pub fn stats(&self) -> SolveStats {
        self.stats
    }

    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    pub fn tour(&self) -> Option<&Tour> {
        self.tour.as_ref()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let runtime = self.runtime.as_secs_f64();
        match self.objective {
            Some(objective) => write!(
                f,
                "Result: {}; status = {}; runtime = {runtime:.2} sec; objective value = {}",
                self.instance,
                self.status,
                format_objective(objective)
            ),
            None => write!(
                f,
                "Fail: {}; status = {}; runtime = {runtime:.2} sec",
                self.instance, self.status
            ),
        }
    }
}

/// Integral objectives print without a fraction; anything else keeps
/// the full float.
fn format_objective(value: f64) -> String {
    if (value - value.round()).abs() < INTEGER_DISPLAY_TOLERANCE {
        format!("{}", value.round() as i64)
    } else {
        value.to_string()
    }
}
