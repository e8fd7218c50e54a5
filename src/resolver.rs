//! Cache key resolution.
//!
//! A [`Resolver`] maps an original resource key plus transform properties to
//! the address of the derived artifact in the cache store. Resolution is
//! pure: no I/O, same inputs give the same key.

use crate::types::{CacheKey, ImageProperties, ResourceKey};

/// Pure mapping from `(resource, properties)` to a cache address.
///
/// Distinct properties should yield distinct cache keys; the orchestrator
/// relies on this but does not check it.
///
/// Any `Fn(&ResourceKey, &P) -> CacheKey` is a resolver:
///
/// ```rust
/// # use cachine::{CacheKey, ResourceKey, Resolver};
/// let by_width = |key: &ResourceKey, width: &u32| CacheKey::new(format!("/w{width}{key}"));
/// assert_eq!(by_width.resolve(&"/a.jpg".into(), &64).as_str(), "/w64/a.jpg");
/// ```
pub trait Resolver<P>: Send + Sync {
    fn resolve(&self, key: &ResourceKey, properties: &P) -> CacheKey;
}

impl<P, F> Resolver<P> for F
where
    F: Fn(&ResourceKey, &P) -> CacheKey + Send + Sync,
{
    fn resolve(&self, key: &ResourceKey, properties: &P) -> CacheKey {
        self(key, properties)
    }
}

/// Places each image variant under a `/{width}x{height}` directory.
///
/// `"/photos/cat.jpg"` at 12x34 resolves to `"/12x34/photos/cat.jpg"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantPathResolver;

impl VariantPathResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolver<ImageProperties> for VariantPathResolver {
    fn resolve(&self, key: &ResourceKey, properties: &ImageProperties) -> CacheKey {
        let mut path = format!("/{}x{}", properties.width, properties.height);
        for segment in normalize(key.as_str()) {
            path.push('/');
            path.push_str(segment);
        }
        CacheKey::new(path)
    }
}

/// Collapse empty and `.` segments; `..` pops but never past the root.
fn normalize(key: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(key: &str, width: u32, height: u32) -> String {
        VariantPathResolver
            .resolve(&key.into(), &ImageProperties::new(width, height))
            .as_str()
            .to_string()
    }

    #[test]
    fn prefixes_variant_directory() {
        assert_eq!(
            resolve("/path/to/image/resource", 12, 34),
            "/12x34/path/to/image/resource"
        );
    }

    #[test]
    fn relative_keys_are_rooted() {
        assert_eq!(resolve("a/b.jpg", 1, 2), "/1x2/a/b.jpg");
    }

    #[test]
    fn normalizes_segments() {
        assert_eq!(resolve("//a/./b//c.jpg", 1, 2), "/1x2/a/b/c.jpg");
        assert_eq!(resolve("/a/../b.jpg", 1, 2), "/1x2/b.jpg");
    }

    #[test]
    fn parent_segments_stay_below_variant() {
        assert_eq!(resolve("/../../etc/passwd", 1, 2), "/1x2/etc/passwd");
    }

    #[test]
    fn distinct_properties_give_distinct_keys() {
        assert_ne!(resolve("/a.jpg", 12, 34), resolve("/a.jpg", 34, 12));
    }

    #[test]
    fn closures_are_resolvers() {
        let resolver = |key: &ResourceKey, props: &ImageProperties| {
            CacheKey::new(format!("{key}@{props}"))
        };
        let key = resolver.resolve(&"/a.jpg".into(), &ImageProperties::new(3, 4));
        assert_eq!(key.as_str(), "/a.jpg@3x4");
    }
}
