//! Pieces shared by the client and the queue drain.
//!
//! - [`transport`] - the [`Transport`](transport::Transport) seam and its reqwest implementation
//! - [`http_utils`] - header redaction and log formatting helpers

pub mod http_utils;
pub mod transport;
