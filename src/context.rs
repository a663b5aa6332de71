//! Memo tables and the validator collaborator.
//!
//! Every cache maps schema content to something derived purely from it, so
//! lookups release the lock while computing: two threads racing on the same
//! key compute the same value, and whichever insert lands first is the one
//! every caller gets back. Failures are never stored.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use regex::Regex;

use crate::schema::{SchemaCore, SchemaKey};
use crate::validator::{JsonSchemaValidator, Validator};
use crate::view::ViewDefinition;

/// A lock-protected map with fill-on-first-access.
pub(crate) struct Memo<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> Memo<K, V> {
    fn new() -> Self {
        Memo {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, V>> {
        // Entries are inserted whole; a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cached value for `key`, or the result of `fill` stored under it.
    pub(crate) fn get_or_try_insert<E>(
        &self,
        key: K,
        fill: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(found) = self.lock().get(&key) {
            return Ok(found.clone());
        }
        let value = fill()?;
        Ok(self.lock().entry(key).or_insert(value).clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Caches and collaborators shared by every schema built in it.
///
/// [`Context::global`] lives for the whole process; independent contexts can
/// be built with [`Context::new`] to inject a different validator or to keep
/// caches scoped to a unit of work.
pub struct Context {
    validator: Box<dyn Validator>,
    pub(crate) property_subschemas: Memo<(SchemaKey, String), Option<Arc<SchemaCore>>>,
    pub(crate) index_subschemas: Memo<(SchemaKey, usize), Option<Arc<SchemaCore>>>,
    pub(crate) property_names: Memo<SchemaKey, Arc<BTreeSet<String>>>,
    pub(crate) views: Memo<SchemaKey, Arc<ViewDefinition>>,
    pub(crate) patterns: Memo<String, Regex>,
}

impl Context {
    pub fn new(validator: impl Validator + 'static) -> Arc<Self> {
        Arc::new(Context {
            validator: Box::new(validator),
            property_subschemas: Memo::new(),
            index_subschemas: Memo::new(),
            property_names: Memo::new(),
            views: Memo::new(),
            patterns: Memo::new(),
        })
    }

    /// The process-wide context, using [`JsonSchemaValidator::default`].
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<Context>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Context::new(JsonSchemaValidator::default())))
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    /// Number of cached view definitions.
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Empty every memo table.
    ///
    /// View definitions handed out earlier stay valid, but later lookups
    /// build fresh ones.
    pub fn clear(&self) {
        tracing::debug!(views = self.views.len(), "clearing schema caches");
        self.property_subschemas.clear();
        self.index_subschemas.clear();
        self.property_names.clear();
        self.views.clear();
        self.patterns.clear();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("views", &self.views.len())
            .field("patterns", &self.patterns.len())
            .finish_non_exhaustive()
    }
}
