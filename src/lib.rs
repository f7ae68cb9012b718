pub mod blink;
pub mod config;
pub mod draw;
pub mod landmarks;
pub mod pixelate;
pub mod process;
pub mod session;
pub mod shapes;
pub mod spawn;
