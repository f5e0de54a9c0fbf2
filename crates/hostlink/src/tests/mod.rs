//! Test suites for the gateway.

mod pipeline;
mod support;
