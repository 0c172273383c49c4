pub mod app_factory;

pub use app_factory::{RagDeskFactory, RagDeskServices};
