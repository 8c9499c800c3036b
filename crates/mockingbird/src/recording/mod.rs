//! Record mode: turning proxied exchanges into mappings.
//!
//! When a request matches no mapping and a proxy URL is configured, the
//! request is forwarded upstream and the exchange can be saved as a new
//! mapping, so the next identical request is answered locally.
//!
//! # Module Structure
//!
//! - `synthesizer` - builds a mapping from a captured exchange
//! - `url_replace` - upstream URL rewriting

mod synthesizer;
mod url_replace;

pub use synthesizer::synthesize;
pub use url_replace::UrlReplace;
