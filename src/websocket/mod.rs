//! WebSocket transport for door and garage controllers

mod handler;

pub use handler::{device_ws_handler, DeviceQuery};
