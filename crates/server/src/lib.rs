//! Order Autotag server library.
//!
//! An embedded Shopify admin app: the merchant stores a single
//! threshold/tag rule, and `orders/create` webhook deliveries are matched
//! against it. Orders whose total meets the threshold are tagged through
//! the Admin GraphQL `orderUpdate` mutation.
//!
//! The crate is a library so the webhook verification, rule evaluation,
//! and OAuth plumbing can be exercised from the integration-tests member.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
pub mod webhooks;
