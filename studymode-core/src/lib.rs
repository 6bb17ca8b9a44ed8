pub mod errors;
pub mod export;
pub mod models;
pub mod repo;
pub mod scheduler;
pub mod session;
pub mod stats;

pub use errors::*;
pub use export::*;
pub use models::*;
pub use repo::*;
pub use scheduler::*;
pub use session::*;
pub use stats::*;
