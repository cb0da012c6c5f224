//! Xtream relay
//!
//! A CORS-friendly relay that lets a browser browse an IPTV provider's
//! catalog and play its streams, plus the client-side playback adaptation
//! that decides how a relay-served stream is rendered.

pub mod client;
pub mod config;
pub mod errors;
pub mod playback;
pub mod proxy;
pub mod utils;
pub mod web;
