//! Drowsiness monitor: eye-aspect-ratio based drowsiness detection with a
//! debounced, single-shot alarm, served over HTTP for landmark producers and
//! display clients.

pub mod config;
pub mod detection;
pub mod extractors;
pub mod logging;
pub mod middleware;
pub mod monitor;
pub mod response;
pub mod routes;
pub mod session;
pub mod state;
