pub mod summary;
pub mod training_loop;

pub use summary::{read_summary, SummaryRow, SummaryWriter};
pub use training_loop::{Phase, StepReport, StopSignal, TrainingError, TrainingLoop};
