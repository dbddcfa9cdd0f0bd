//! Session lifecycle: the inference session and the manager façade

mod error;
mod inference;
mod manager;
mod progress;

pub use error::ManagerError;
pub use inference::{InferenceSession, ResponseStream};
pub use manager::SessionManager;
pub use progress::{NoOpHandler, ProgressHandler};
