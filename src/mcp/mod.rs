//! MCP server for complaint question answering
//!
//! Exposes retrieval and grounded answers as tools over stdio.

mod server;

pub use server::{run_mcp_server, ComplaintService};
