//! Page sources: where raw task and category markup comes from.
//!
//! The extraction engine only ever sees page text; deciding whether that text
//! comes from the network, the on-disk cache or memory is the job of a
//! [`PageSource`]:
//! - [`HttpPageSource`] fetches from the live site
//! - [`CachedPageSource`] wraps another source with the libSQL page cache
//! - [`MemoryPageSource`] serves a fixed set of pages (tests, embedding)

mod cached;
mod http;
mod memory;

use std::future::Future;

use rosetta_shared::{PageKind, Result};

pub use cached::CachedPageSource;
pub use http::HttpPageSource;
pub use memory::MemoryPageSource;

/// Supplies raw markup for a named task or category page.
///
/// A page that does not exist must be reported as
/// [`RosettaError::NotFound`](rosetta_shared::RosettaError::NotFound) so
/// callers can tell it apart from transport failures.
pub trait PageSource: Send + Sync {
    fn fetch(&self, kind: PageKind, name: &str) -> impl Future<Output = Result<String>> + Send;
}
