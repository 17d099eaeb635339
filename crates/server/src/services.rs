mod pipeline;

pub use pipeline::{run_pipeline, Origin, Outcome};
