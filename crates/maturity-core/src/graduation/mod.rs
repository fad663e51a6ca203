//! Graduation exams: the only automatic path up the maturity ladder.

pub mod collaborators;
pub mod fixture;
pub mod pipeline;
pub mod stages;

pub use collaborators::{
    CollaboratorError, EdgeCaseSimulator, EpisodeMetricsService, EpisodeSummary,
    ReadinessMetrics, SimulationOutcome, SkillMasteryAssessment,
};
pub use fixture::FixtureCollaborators;
pub use pipeline::GraduationExamPipeline;
