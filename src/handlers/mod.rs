pub mod render;
pub mod session;
pub mod store;

pub use render::render_reports;
pub use session::{FoodSession, SessionOrchestrator, SessionSnapshot};
pub use store::SessionStore;
