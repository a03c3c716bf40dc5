//! HTTP API handlers for shelf-api

pub mod auth;
pub mod catalog;
pub mod health;
pub mod membership;

pub use auth::auth_middleware;
pub use catalog::{all_achievements, audiobooks, book_sponsors, chapters};
pub use health::health_routes;
pub use membership::{all_contacts, all_members, pricing_plans, sold_subscriptions};
