mod handler;
mod model;

pub use handler::{get_public_profile, health};
