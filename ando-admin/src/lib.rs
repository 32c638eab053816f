pub mod server;

pub use server::{start, AdminState};
