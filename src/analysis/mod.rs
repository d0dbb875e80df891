pub mod content;
pub mod recommend;

pub use content::{ContentAnalysis, analyze};
pub use recommend::recommend;
