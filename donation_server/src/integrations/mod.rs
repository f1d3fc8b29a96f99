//! Glue between engine events and the outside world.
pub mod live_feed;
