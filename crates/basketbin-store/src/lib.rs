//! Basket and captured-request persistence with token ownership
//!
//! The [`AccessLayer`] is the single entry point for the rest of the system.
//! It composes three independently owned resources:
//!
//! - [`BasketStore`]: basket identity, uniqueness and claim tokens
//! - [`RequestStore`]: append-only capture metadata per basket
//! - a [`BlobStore`]: request bodies, referenced from metadata by opaque id
//!
//! No transaction spans these resources. Basket deletion is run as a
//! journaled cascade (see [`cascade`]) so an interrupted delete can be
//! resumed instead of silently orphaning data.

pub mod access;
pub mod basket_store;
pub mod blob;
pub mod cascade;
pub mod config;
pub mod error;
pub mod name;
pub mod normalize;
pub mod request_store;
pub mod token;

pub use access::{AccessLayer, Capture};
pub use basket_store::BasketStore;
pub use blob::{BlobError, BlobId, BlobStore, MemoryBlobStore};
pub use cascade::{CascadeJournal, CascadeReport};
pub use config::StoreConfig;
pub use error::{CleanupOutcome, StoreError, StoreResult};
pub use name::validate_basket_name;
pub use normalize::{content_type, normalize, NormalizedRequest};
pub use request_store::{NewRequest, RequestStore};
pub use token::{Token, TokenError, TokenGenerator};

pub use basketbin_db::entities::basket::Model as Basket;
pub use basketbin_db::entities::captured_request::Model as StoredRequest;
