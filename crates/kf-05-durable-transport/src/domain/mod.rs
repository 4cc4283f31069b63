//! Domain module for the durable transport
//!
//! - codec: event ⇄ wire message
//! - subject: subject naming and wildcard filters

pub mod codec;
pub mod subject;

pub use codec::{decode, encode, WireMessage};
pub use subject::{archive_subject, consumer_name, consumer_subject, subject_matches};
