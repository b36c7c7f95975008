//! Type synthesis cache ("module scope")
//!
//! Owns the code container that hosts synthesized types and maps each
//! [`GenerationSignature`] to the one type produced for it. Lookups for
//! different signatures proceed in parallel; the factory for a given
//! signature runs at most once at a time and its first success is final.
//! A cell is only removed from the map by the thread holding its init lock,
//! so callers queued on a failed cell move to its replacement instead of
//! racing it. Emission into the shared container is serialized by the
//! container lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::config::EngineConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::model::TypeDef;

use super::emit::{CodeContainer, CodeEmitter, ThunkTableEmitter, TypePlan};
use super::hook::GenerationHook;
use super::signature::GenerationSignature;
use super::synthesized::SynthesizedType;

/// Per-signature slot. `value` is set once, under `init`.
#[derive(Default)]
struct EntryCell {
    value: OnceCell<Arc<SynthesizedTypeEntry>>,
    init: Mutex<()>,
}

/// A cached generation result
pub struct SynthesizedTypeEntry {
    signature: GenerationSignature,
    produced: Arc<SynthesizedType>,
    hook: Arc<dyn GenerationHook>,
}

impl SynthesizedTypeEntry {
    /// Signature the type was generated for
    pub fn signature(&self) -> &GenerationSignature {
        &self.signature
    }

    /// The synthesized type
    pub fn produced_type(&self) -> &Arc<SynthesizedType> {
        &self.produced
    }

    /// Hook used during generation
    pub fn hook(&self) -> &Arc<dyn GenerationHook> {
        &self.hook
    }
}

impl fmt::Debug for SynthesizedTypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedTypeEntry")
            .field("signature", &self.signature)
            .field("produced", &self.produced.name())
            .finish()
    }
}

/// Cache guaranteeing at most one synthesized type per signature
pub struct TypeSynthesisCache {
    entries: RwLock<FxHashMap<GenerationSignature, Arc<EntryCell>>>,
    container: Mutex<CodeContainer>,
    emitter: Arc<dyn CodeEmitter>,
    namespace: String,
    counter: AtomicUsize,
    disposed: AtomicBool,
}

impl TypeSynthesisCache {
    /// Create a cache with the default configuration
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Create a cache placing types in the configured namespace
    pub fn with_config(config: &EngineConfig) -> Self {
        Self::with_emitter(config, Arc::new(ThunkTableEmitter))
    }

    /// Create a cache using a custom code emitter
    pub fn with_emitter(config: &EngineConfig, emitter: Arc<dyn CodeEmitter>) -> Self {
        let namespace = config.scope.namespace.clone();
        Self {
            entries: RwLock::new(FxHashMap::default()),
            container: Mutex::new(CodeContainer::new(namespace.clone())),
            emitter,
            namespace,
            counter: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// Namespace of synthesized types
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Return the type cached for `signature`, or run `factory` to produce it.
    ///
    /// Concurrent callers with equal signatures observe a single factory
    /// run and the same result. A failing factory leaves no entry.
    pub fn get_or_create<F>(&self, signature: &GenerationSignature, factory: F) -> GenerationResult<Arc<SynthesizedType>>
    where
        F: FnOnce() -> GenerationResult<Arc<SynthesizedType>>,
    {
        if self.is_disposed() {
            return Err(GenerationError::ScopeDisposed);
        }

        if let Some(entry) = self.entry(signature) {
            tracing::trace!(proxy_type = entry.produced.name(), "type cache hit");
            return Ok(Arc::clone(&entry.produced));
        }

        loop {
            if self.is_disposed() {
                return Err(GenerationError::ScopeDisposed);
            }
            let cell = self.cell_for(signature);
            let _init = cell.init.lock();
            if let Some(entry) = cell.value.get() {
                return Ok(Arc::clone(&entry.produced));
            }
            // Abandoned by a failed factory; queue on the replacement
            if !self.is_current(signature, &cell) {
                continue;
            }

            tracing::debug!(
                shape = signature.shape().label(),
                base = %signature.base_type().full_name(),
                capabilities = signature.capabilities().len(),
                "type cache miss, generating"
            );
            return match factory() {
                Ok(produced) => {
                    let entry = cell.value.get_or_init(|| {
                        Arc::new(SynthesizedTypeEntry {
                            signature: signature.clone(),
                            produced,
                            hook: Arc::clone(&signature.options().hook),
                        })
                    });
                    Ok(Arc::clone(&entry.produced))
                }
                Err(err) => {
                    let mut entries = self.entries.write();
                    if entries.get(signature).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
                        entries.remove(signature);
                    }
                    tracing::debug!(error = %err, "type generation failed");
                    Err(err)
                }
            };
        }
    }

    fn cell_for(&self, signature: &GenerationSignature) -> Arc<EntryCell> {
        if let Some(cell) = self.entries.read().get(signature) {
            return Arc::clone(cell);
        }
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(signature.clone()).or_default())
    }

    fn is_current(&self, signature: &GenerationSignature, cell: &Arc<EntryCell>) -> bool {
        self.entries
            .read()
            .get(signature)
            .is_some_and(|current| Arc::ptr_eq(current, cell))
    }

    /// Reserve a unique name for a proxy of `primary`: `(namespace, name)`
    pub fn next_type_name(&self, primary: &TypeDef) -> (String, String) {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        (self.namespace.clone(), format!("{}Proxy{}", primary.name(), n))
    }

    /// Emit `plan` into the code container
    pub fn emit(&self, plan: TypePlan) -> GenerationResult<Arc<SynthesizedType>> {
        let mut container = self.container.lock();
        let produced = self.emitter.emit(plan, &mut container)?;
        Ok(Arc::new(produced))
    }

    /// Invalidate every type produced by this cache and refuse new requests
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.container.lock().seal();
        let dropped = {
            let mut entries = self.entries.write();
            let count = entries.len();
            entries.clear();
            count
        };
        tracing::debug!(entries = dropped, "type synthesis cache disposed");
    }

    /// Whether [`dispose`](Self::dispose) was called
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Number of cached types
    pub fn len(&self) -> usize {
        self.entries.read().values().filter(|cell| cell.value.get().is_some()).count()
    }

    /// Whether no type is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a type is cached for `signature`
    pub fn contains(&self, signature: &GenerationSignature) -> bool {
        self.entries
            .read()
            .get(signature)
            .is_some_and(|cell| cell.value.get().is_some())
    }

    /// Cached entry for `signature`
    pub fn entry(&self, signature: &GenerationSignature) -> Option<Arc<SynthesizedTypeEntry>> {
        self.entries.read().get(signature).and_then(|cell| cell.value.get().cloned())
    }

    /// Names of all types defined in the code container, in definition order
    pub fn type_names(&self) -> Vec<String> {
        self.container.lock().type_names().to_vec()
    }
}

impl Default for TypeSynthesisCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeSynthesisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSynthesisCache")
            .field("namespace", &self.namespace)
            .field("emitter", &self.emitter.name())
            .field("entries", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
