//! procache.
//!
//! procache is a standalone web service that serves markdown content from disk. Every document is
//! parsed once and then kept in memory for the lifetime of the process. In development mode, the
//! content directory is watched and edited documents are parsed again on their next request.

#![warn(missing_docs, missing_debug_implementations, clippy::all)]

mod cli;
mod config;
mod endpoints;
mod logging;
mod server;
mod service;


fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
