//! Boxed futures for object-safe async traits.

use std::future::Future;
use std::pin::Pin;

/// A boxed future for async trait methods.
///
/// The store and provider traits are used as `Arc<dyn Trait>`, so their async
/// methods return boxed futures instead of `impl Future`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
