//! Detector building blocks used by [`crate::detector::EigerDetector`].

pub mod connection;
pub mod features;
pub mod resource;
pub mod session;
pub mod tables;
