pub mod config;
pub mod request;

pub use config::{load_dotenv, EngineConfig, EngineConfigUpdate};
pub use request::{GenerationRequest, PriorityHint, Tier};
