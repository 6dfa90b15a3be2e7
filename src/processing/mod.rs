pub mod phases;

pub use phases::{AggregateReport, PhaseAggregator, PhaseOutcome, PhaseStatus};
