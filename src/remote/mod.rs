//! Remote tier: HTTP access to the restaurant backend.
//!
//! Endpoints:
//! - `GET <restaurants-base>`: array of restaurants
//! - `GET <reviews-base>/?restaurant_id=<id>`: array (or single object) of reviews
//! - `PUT <restaurants-base>/<id>/?is_favorite=<bool>`: the updated restaurant
//! - `POST <reviews-base>/`: the created review

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod source;

pub use client::HttpRemote;
pub use source::RemoteSource;
