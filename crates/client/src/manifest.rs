//! The precache manifest: resources that must be in the store right after install.

use std::collections::HashSet;
use url::Url;

use crate::fetch::resolve;
use shellcache_core::{Error, Request};

/// Ordered, duplicate-free list of resource URLs within the app scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    scope: Url,
    resources: Vec<Url>,
}

impl Manifest {
    /// Resolve `paths` against `scope`.
    ///
    /// # Errors
    ///
    /// `INVALID_URL` for an unresolvable entry, `INVALID_INPUT` when two
    /// entries resolve to the same request.
    pub fn new<I, S>(scope: Url, paths: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut resources = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let url = resolve(&scope, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
            if !seen.insert(url.clone()) {
                return Err(Error::InvalidInput(format!("duplicate manifest entry: {url}")));
            }
            resources.push(url);
        }

        Ok(Self { scope, resources })
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn resources(&self) -> &[Url] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.resources.contains(url)
    }

    /// GET requests for every resource, in manifest order.
    pub fn requests(&self) -> impl Iterator<Item = Request> + '_ {
        self.resources.iter().cloned().map(Request::get)
    }
}
