//! # Donation server
//! The HTTP and WebSocket front end of the donation payment gateway. It is responsible for:
//! * Creating donation orders and sending the donor to the gateway's payment page.
//! * Receiving the gateway's payment notifications and handing them to the reconciliation engine.
//! * Pushing confirmed donations to live viewers over WebSocket.
//! * Serving the rankings, category listings, terminal activation and refunds.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/ws`: The live donation feed.
//! * `POST /api/donate`, `POST /api/donate/form`: Start a donation.
//! * `POST /api/callback`: Payment notifications from the gateway.
//! * `GET /api/rankings`: Completed donations, newest first.
//! * `GET /api/categories`, `GET /api/category/{id}`: Donation categories.
//! * `POST /api/activate`: Activate a tenant's terminal.
//! * `POST /api/refund/{order_id}`: Refund a completed donation.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod heartbeat_worker;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;
pub mod ws;

#[cfg(test)]
mod endpoint_tests;
