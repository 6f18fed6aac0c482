pub mod element;
pub mod fingerprint;
pub mod reader;
