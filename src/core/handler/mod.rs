//! Document processing entry points
//!
//! [`ResourceHandler`] drives one batch of documents through text extraction,
//! text analysis with [`RetryPolicy`], mapping and composition, and returns the
//! transaction bundle.

pub mod resource_handler;
pub mod retry;
pub mod text;

pub use resource_handler::ResourceHandler;
pub use retry::RetryPolicy;
pub use text::DocumentText;
