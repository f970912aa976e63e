/// Dynamic loading of path-addressed content
///
/// Entity uuids double as paths, so a navigation to `/a/b` may concern
/// entities `/a` and `/a/b` that were never loaded. Each prefix is probed at
/// most once per scene; a prefix with no matching entity is handed to the
/// store as a load request for `<prefix>/`.
use crate::document::Document;
use crate::scene::Scene;
use crate::store::{Query, Request, System};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Prefixes already probed; only ever grows
#[derive(Debug, Clone, Default)]
pub struct ProbeSet {
    probed: HashSet<String>,
}

impl ProbeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.probed.contains(prefix)
    }

    /// Record `prefix`, returning false if it was already probed
    pub fn insert(&mut self, prefix: impl Into<String>) -> bool {
        self.probed.insert(prefix.into())
    }

    pub fn len(&self) -> usize {
        self.probed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probed.is_empty()
    }
}

/// Slash-rooted prefixes of `path`, shortest first
///
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`. Empty segments are skipped and a
/// path that is not slash-rooted yields nothing.
pub fn path_prefixes(path: &str) -> Vec<String> {
    let Some(rest) = path.strip_prefix('/') else {
        return Vec::new();
    };

    let mut prefix = String::with_capacity(path.len());
    rest.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            prefix.push('/');
            prefix.push_str(segment);
            prefix.clone()
        })
        .collect()
}

impl<D: Document> Scene<D> {
    /// Request lazy loads for unknown prefixes of `path`, returning how many
    /// requests were issued
    #[instrument(skip(self, sys))]
    pub fn dynamic_load(&mut self, sys: &System, path: &str) -> usize {
        let mut requested = 0;
        for prefix in path_prefixes(path) {
            if !self.probes.insert(prefix.as_str()) {
                continue;
            }
            if !sys.query(&Query::Uuid(prefix.clone())).is_empty() {
                continue;
            }
            debug!(prefix = %prefix, "Requesting load");
            sys.resolve(Request::Load(format!("{}/", prefix)));
            requested += 1;
        }
        requested
    }
}
