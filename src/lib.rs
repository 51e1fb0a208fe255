pub mod data;
pub mod jobs;
