mod connection;

pub use connection::{Frame, PeerConnection};
