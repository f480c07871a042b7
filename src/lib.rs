pub mod error;
pub mod input;
pub mod kart;
pub mod net;
pub mod physics;
pub mod settings;
pub mod spawn;
pub mod state;
pub mod vehicle;
