pub mod cli_main;
pub mod controller;
pub mod error;
pub mod page;
pub mod server;
pub mod state;

pub use controller::{SubmitOutcome, UiController};
pub use server::{router, serve, AppState};
