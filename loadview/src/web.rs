mod dashboard;
mod server;

pub use dashboard::Dashboard;
pub use server::{WebUi, WebUiConfig};
