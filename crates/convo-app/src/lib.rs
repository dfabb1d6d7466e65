//! Convo App: WASM entry point.
//!
//! This crate is the composition root (DI wiring layer).
//! It assembles the HTTP adapter and the conversation client and hands
//! them to the JavaScript UI as a [`ConvoApp`] handle.

mod app;


pub use app::ConvoApp;

use wasm_bindgen::prelude::*;

/// WASM entry point, runs when the module is instantiated
#[wasm_bindgen(start)]
pub fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Convo WASM starting...");
}
