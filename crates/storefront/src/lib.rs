//! Nature Marketplace storefront library.
//!
//! Client-side state for the storefront (cart, favorites, session, language)
//! and the edge server that guards routes in front of the web bundle.
//!
//! # Modules
//!
//! - [`storage`] - Persistent key-value store adapter
//! - [`api`] - Marketplace backend client
//! - [`catalog`] - Cached product catalog reads
//! - [`auth`] - Token lifecycle and current-user resolution
//! - [`cart`] - Stock-aware shopping cart
//! - [`favorites`] - Local-first favorites with remote sync
//! - [`locale`] - Language preference
//! - [`app`] - Container wiring the stores together
//! - [`middleware`], [`routes`], [`state`] - Edge server

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod app;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod favorites;
pub mod locale;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod storage;

pub use app::Storefront;
