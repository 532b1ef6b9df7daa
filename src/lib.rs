pub mod analysis;
pub mod autocorrelation;
pub mod batch;
pub mod constants;
pub mod curves;
pub mod export;
pub mod fitting;
pub mod kinematics;
pub mod motility_errors;
pub mod msd;
pub mod trajectories;

pub use analysis::{analyze_table, AnalysisBundle, AnalysisParams};
pub use batch::{analyze_batch, analyze_directory, BatchItemFailure, BatchReport};
pub use motility_errors::MotilityError;
pub use trajectories::{Sample, Track, TrajectoryTable};
