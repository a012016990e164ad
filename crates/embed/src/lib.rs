//! # Compass Embed
//!
//! Gateway to the external embedding provider(s). The provider is a black
//! box with a timeout/retry contract: text in, fixed-dimension vector out.
//!
//! Code and documentation are embedded by separately configured models; the
//! routing is a closed lookup over [`ContentClass`], never runtime type
//! inspection.

mod error;
mod http;
mod provider;
mod router;

pub use error::{EmbedError, Result};
pub use http::{HttpEmbeddingProvider, HttpProviderConfig};
pub use provider::EmbeddingProvider;
pub use router::{ContentClass, EmbeddingRouter};
