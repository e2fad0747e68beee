//! # Movie Types Crate
//!
//! Shared vocabulary for the movies service:
//!
//! - **types**: upstream entities (`MovieMetadata`, `Review`) and the
//!   composite `Movie` returned to callers
//! - **error**: the closed failure taxonomy (`UpstreamError`, `ErrorKind`)
//!
//! ## Example Usage
//!
//! ```ignore
//! use movie_types::{ErrorKind, Movie, UpstreamError};
//!
//! match aggregator.retrieve_movie("abc").await {
//!     Ok(movie) => println!("{} has {} reviews", movie.metadata.title, movie.reviews.len()),
//!     Err(err) if err.kind() == ErrorKind::UpstreamNotFound => println!("{}", err),
//!     Err(err) => return Err(err.into()),
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{ErrorKind, Result, UpstreamError};
pub use types::{Movie, MovieInfoId, MovieMetadata, Review, ReviewId};
