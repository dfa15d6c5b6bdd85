//! SocketCAN transceiver (Linux only)

mod adapter;

pub use adapter::SocketCanBus;
