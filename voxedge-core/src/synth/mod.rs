pub mod job;
pub mod request;

pub use job::{default_output_dir, posix_path, SynthesisJob, OUTPUT_PREFIX, OUTPUT_SUFFIX};
pub use request::{format_pitch, format_rate, SynthesisRequest};
