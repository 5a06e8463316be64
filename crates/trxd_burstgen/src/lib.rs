pub mod burst;
pub mod capture;
pub mod config;
pub mod generator;
pub mod message;
pub mod sequencer;

pub use burst::{BurstGenerator, BurstType};
pub use capture::CaptureWriter;
pub use config::{GenerationRun, RunParams};
pub use generator::{run_generator, RunSummary, Transport};
pub use message::DataMessage;
