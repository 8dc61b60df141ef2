//! Mocket - stub HTTP server
//!
//! Loads a directory of declarative mock definitions and answers each
//! incoming request with the response of the single definition it matches,
//! substituting values captured from the request into that response.
//!
//! # Matching
//!
//! - **Path**: the method and every path segment are matched one level at a
//!   time against a tree of literal or regular expression segments
//! - **Headers**: header label/value patterns contribute captured variables
//!   but never reject a request
//! - **Body**: an optional body pattern must match for the definition to apply
//!
//! Named groups are captured under their name and unnamed groups under their
//! position. Later phases override earlier ones: path, then headers, then body.
//!
//! # Example Definition
//!
//! ```json
//! {
//!   "request": {
//!     "method": "get",
//!     "path": "/items/(?P<id>\\d+)"
//!   },
//!   "response": {
//!     "status": 200,
//!     "headers": {"content-type": "text/plain"},
//!     "body": "item {{id}}"
//!   }
//! }
//! ```

pub mod config;
pub mod definition;
pub mod error;
pub mod pattern;
pub mod resolver;
pub mod server;
pub mod template;
pub mod tree;

pub use config::{MockFile, ServerSettings};
pub use definition::{BodyMatcher, CompiledMock, MockDefinition};
pub use error::LoadError;
pub use pattern::{BodyPattern, CaptureSet, Pattern};
pub use resolver::{IncomingRequest, Resolution, Resolver};
pub use server::MockServer;
pub use template::{MockResponse, TemplateEngine};
pub use tree::MatchTree;
