pub mod apply;
pub mod config;
pub mod ingest;
pub mod recommend;
pub mod status;

pub use apply::run_apply;
pub use ingest::run_ingest;
pub use recommend::run_recommend;
pub use status::show_status;
