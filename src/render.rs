//! Renderer collaborator seam
//!
//! The core does not implement a template engine; it only defines the
//! surface a rendering collaborator presents (`render`, `exists`,
//! `supports`) and offers [`CachedRenderer`], which memoizes rendered
//! output in a [`Cache`].
//!
//! Cache keys combine the template name with the SHA-256 of the
//! canonical-JSON parameter map, so logically equal parameter sets hit the
//! same entry regardless of construction order.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::pool::Cache;

/// Template parameters.
pub type Parameters = Map<String, Value>;

/// A rendering failure.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No template under this name
    #[error("template not found: {0}")]
    NotFound(String),

    /// The template exists but failed to render
    #[error("render of `{name}` failed: {detail}")]
    Failed {
        /// Template name
        name: String,
        /// Engine-specific detail
        detail: String,
    },
}

/// A template-rendering collaborator.
pub trait Renderer {
    /// Render the named template with the given parameters.
    fn render(&self, name: &str, parameters: &Parameters) -> Result<String, RenderError>;

    /// Whether a template exists under this name.
    fn exists(&self, name: &str) -> bool;

    /// Whether this renderer handles the named template at all.
    fn supports(&self, name: &str) -> bool;
}

/// A renderer that memoizes output in a cache.
///
/// Rendering is only skipped on a cache hit; on a miss the inner renderer
/// runs and the output is stored best-effort: a failed cache write is
/// logged and the freshly rendered string is still returned.
pub struct CachedRenderer<R> {
    inner: R,
    cache: Arc<Cache>,
    ttl: Option<Duration>,
}

impl<R: Renderer> CachedRenderer<R> {
    /// Wrap a renderer with a cache and no entry lifetime bound.
    pub fn new(inner: R, cache: Arc<Cache>) -> Self {
        Self {
            inner,
            cache,
            ttl: None,
        }
    }

    /// Bound the lifetime of cached output.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The wrapped renderer.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn entry_key(name: &str, parameters: &Parameters) -> String {
        // Canonical JSON keeps the digest independent of map insertion
        // order and formatting.
        let canonical = serde_json_canonicalizer::to_vec(&Value::Object(parameters.clone()))
            .unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        format!("render:{}:{}", name, hex::encode(digest))
    }
}

impl<R: Renderer> Renderer for CachedRenderer<R> {
    fn render(&self, name: &str, parameters: &Parameters) -> Result<String, RenderError> {
        let key = Self::entry_key(name, parameters);

        match self.cache.get(&key) {
            Ok(Some(bytes)) => {
                if let Ok(cached) = String::from_utf8(bytes) {
                    return Ok(cached);
                }
                warn!(template = name, "cached render output is not UTF-8, re-rendering");
            }
            Ok(None) => {}
            Err(e) => warn!(template = name, "render cache read failed: {e}"),
        }

        let output = self.inner.render(name, parameters)?;

        let stored = match self.ttl {
            Some(ttl) => self.cache.set_with_ttl(&key, output.as_bytes(), ttl),
            None => self.cache.set(&key, output.as_bytes()),
        };
        if let Err(e) = stored {
            warn!(template = name, "render cache write failed: {e}");
        }

        Ok(output)
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }

    fn supports(&self, name: &str) -> bool {
        self.inner.supports(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::capabilities::RuntimeCapabilities;
    use crate::config::CacheSpec;
    use crate::pool::CachePool;
    use parking_lot::Mutex;

    /// Counts real renders; output embeds the `who` parameter.
    struct CountingRenderer {
        renders: Mutex<usize>,
    }

    impl CountingRenderer {
        fn new() -> Self {
            Self {
                renders: Mutex::new(0),
            }
        }
    }

    impl Renderer for CountingRenderer {
        fn render(&self, name: &str, parameters: &Parameters) -> Result<String, RenderError> {
            if name == "missing" {
                return Err(RenderError::NotFound(name.to_string()));
            }
            *self.renders.lock() += 1;
            let who = parameters
                .get("who")
                .and_then(Value::as_str)
                .unwrap_or("world");
            Ok(format!("hello {who}"))
        }

        fn exists(&self, name: &str) -> bool {
            name != "missing"
        }

        fn supports(&self, _name: &str) -> bool {
            true
        }
    }

    fn cache() -> Arc<Cache> {
        let pool = CachePool::new(
            RuntimeCapabilities::from_kinds(vec![BackendKind::Memory]),
            false,
        );
        pool.get_or_create(&CacheSpec::new("render")).unwrap()
    }

    fn params(who: &str) -> Parameters {
        let mut map = Parameters::new();
        map.insert("who".to_string(), Value::String(who.to_string()));
        map
    }

    #[test]
    fn renders_once_per_distinct_input() {
        let renderer = CachedRenderer::new(CountingRenderer::new(), cache());

        assert_eq!(renderer.render("greet", &params("a")).unwrap(), "hello a");
        assert_eq!(renderer.render("greet", &params("a")).unwrap(), "hello a");
        assert_eq!(*renderer.inner().renders.lock(), 1);

        assert_eq!(renderer.render("greet", &params("b")).unwrap(), "hello b");
        assert_eq!(*renderer.inner().renders.lock(), 2);
    }

    #[test]
    fn distinct_template_names_do_not_collide() {
        let renderer = CachedRenderer::new(CountingRenderer::new(), cache());
        renderer.render("one", &params("a")).unwrap();
        renderer.render("two", &params("a")).unwrap();
        assert_eq!(*renderer.inner().renders.lock(), 2);
    }

    #[test]
    fn render_errors_pass_through_uncached() {
        let renderer = CachedRenderer::new(CountingRenderer::new(), cache());
        let err = renderer.render("missing", &Parameters::new()).unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));
    }

    #[test]
    fn exists_and_supports_delegate() {
        let renderer = CachedRenderer::new(CountingRenderer::new(), cache());
        assert!(renderer.exists("greet"));
        assert!(!renderer.exists("missing"));
        assert!(renderer.supports("anything"));
    }

    #[test]
    fn parameter_order_does_not_change_the_key() {
        let mut a = Parameters::new();
        a.insert("x".to_string(), Value::from(1));
        a.insert("y".to_string(), Value::from(2));

        let mut b = Parameters::new();
        b.insert("y".to_string(), Value::from(2));
        b.insert("x".to_string(), Value::from(1));

        assert_eq!(
            CachedRenderer::<CountingRenderer>::entry_key("t", &a),
            CachedRenderer::<CountingRenderer>::entry_key("t", &b),
        );
    }
}
