pub mod lifecycle;
pub mod preview;
pub mod retrieval;
pub mod transport;
