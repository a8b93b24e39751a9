//! Integration tests for the Lagoon client

mod cluster;
mod deletion;
mod listing;
mod selection_flow;
mod support;
