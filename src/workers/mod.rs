pub mod pipeline;
pub mod queue;
pub mod transcoder;
