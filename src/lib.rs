//! Mocket
//!
//! An HTTP mock server. Endpoint definitions describe a method, a path
//! pattern and templated request/response bodies; live traffic matching a
//! definition is answered with freshly synthesized data.
//!
//! # Features
//!
//! - **Route Resolution**: `:id` / `{id}` parameters, `*rest` wildcards,
//!   exact matches always win, configurable tie-break between patterns
//! - **Request Validation**: POST/PUT/PATCH bodies checked against a
//!   placeholder template, with the offending field path on failure
//! - **Response Synthesis**: `<<type>>` placeholders replaced by generated
//!   values on every request
//! - **Request-Aware Templates**: Handlebars expressions over path params,
//!   query and body
//! - **OpenAPI Import**: Swagger 2 and OpenAPI 3 documents compiled into
//!   definitions, one outcome per operation
//!
//! # Example Configuration
//!
//! ```yaml
//! collections:
//!   - name: pet-store
//!     definitions:
//!       - method: GET
//!         path: /pets/:id
//!         response:
//!           status: 200
//!           body:
//!             id: "<<number>>"
//!             name: "<<firstname>>"
//!             tags: ["<<word>>", "<<word>>"]
//!       - method: POST
//!         path: /pets
//!         request:
//!           name: "<<string>>"
//!         response:
//!           status: 201
//!           body:
//!             id: "<<uuid>>"
//! ```

pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod generator;
pub mod matcher;
pub mod model;
pub mod server;
pub mod store;
pub mod synthesizer;
pub mod template;
pub mod validator;

pub use config::MocketConfig;
pub use engine::{InboundRequest, MockEngine, MockResponse};
pub use error::EngineError;
pub use store::MemoryStore;
