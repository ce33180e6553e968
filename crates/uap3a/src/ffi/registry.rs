//! Process-wide state behind the C API.
//!
//! Holds the service singleton, the live processors and the engine factory.
//! The pointers handed to C are opaque tokens drawn from a counter that
//! never repeats, so a stale handle can never name a later object even when
//! the allocator reuses memory. Nothing behind a token is reached except
//! through these tables.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::{mem, ptr};

use crate::engine::{AudioProcessingEngine, LoopbackEngine};
use crate::error::Error;
use crate::processor::Processor;
use crate::service::Service;

use super::types::{ApProcessor, ApProcessorEventHandler, ApService};

/// Builds the engine behind each new processor. `None` aborts creation.
pub type EngineFactory = fn() -> Option<Box<dyn AudioProcessingEngine>>;

/// The singleton together with the token it was handed out under.
#[derive(Debug)]
struct ServiceSlot {
    token: usize,
    service: ApService,
}

static NEXT_TOKEN: AtomicUsize = AtomicUsize::new(1);
static SERVICE: Mutex<Option<ServiceSlot>> = Mutex::new(None);
static PROCESSORS: Mutex<BTreeMap<usize, Arc<Mutex<ApProcessor>>>> = Mutex::new(BTreeMap::new());
static ENGINE_FACTORY: Mutex<EngineFactory> = Mutex::new(loopback_engine as EngineFactory);
static ENGINE_SDK_VERSION: Mutex<Option<&'static str>> = Mutex::new(None);

fn loopback_engine() -> Option<Box<dyn AudioProcessingEngine>> {
    Some(Box::new(LoopbackEngine::new()))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reserves a fresh token. Zero is never returned, so no token reads as
/// null on the C side.
pub(crate) fn next_token() -> usize {
    loop {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        if token != 0 {
            return token;
        }
    }
}

fn as_handle<T>(token: usize) -> *mut T {
    ptr::without_provenance_mut(token)
}

/// Replaces the engine factory used by `agora_ap_processor_create*`.
///
/// Returns the previous factory. The default builds a [`LoopbackEngine`].
pub fn set_engine_factory(factory: EngineFactory) -> EngineFactory {
    let previous = mem::replace(&mut *lock(&ENGINE_FACTORY), factory);
    *lock(&ENGINE_SDK_VERSION) = None;
    previous
}

pub(crate) fn new_engine() -> Option<Box<dyn AudioProcessingEngine>> {
    let factory = *lock(&ENGINE_FACTORY);
    let engine = factory()?;
    *lock(&ENGINE_SDK_VERSION) = Some(engine.sdk_version());
    Some(engine)
}

/// SDK version of the engines the current factory builds.
///
/// Builds one throwaway engine if none has been built yet.
pub(crate) fn engine_sdk_version() -> Option<&'static str> {
    if let Some(version) = *lock(&ENGINE_SDK_VERSION) {
        return Some(version);
    }
    new_engine().map(|engine| engine.sdk_version())
}

/// Returns the singleton, allocating it on first use.
pub(crate) fn create_service() -> *mut ApService {
    let mut slot = lock(&SERVICE);
    let slot = slot.get_or_insert_with(|| {
        let token = next_token();
        tracing::info!(token, "service created");
        ServiceSlot {
            token,
            service: ApService::default(),
        }
    });
    as_handle(slot.token)
}

/// Runs `f` on the singleton if `handle` names it.
pub(crate) fn with_service<R>(
    handle: *mut ApService,
    f: impl FnOnce(&mut ApService) -> R,
) -> Result<R, Error> {
    let mut slot = lock(&SERVICE);
    match slot.as_mut() {
        Some(slot) if names(slot, handle) => Ok(f(&mut slot.service)),
        _ => Err(Error::InvalidHandle),
    }
}

fn names(slot: &ServiceSlot, handle: *mut ApService) -> bool {
    !handle.is_null() && slot.token == handle.addr()
}

/// Copies what a new processor needs out of an initialized service.
pub(crate) fn service_snapshot(
    handle: *mut ApService,
) -> Result<(Service, ApProcessorEventHandler), Error> {
    with_service(handle, |service| {
        let event_handler = service.event_handler;
        service
            .service
            .clone()
            .map(|service| (service, event_handler))
            .ok_or(Error::NotInitialized)
    })?
}

/// Destroys the singleton if `handle` names it. Returns whether it did.
pub(crate) fn release_service(handle: *mut ApService) -> bool {
    let released = {
        let mut slot = lock(&SERVICE);
        let matches = slot.as_ref().is_some_and(|slot| names(slot, handle));
        if matches { slot.take() } else { None }
    };
    // Dropped outside the lock.
    match released {
        Some(slot) => {
            tracing::info!(
                token = slot.token,
                initialized = slot.service.is_initialized(),
                "service released"
            );
            true
        }
        None => {
            tracing::warn!(?handle, "release of unknown service handle ignored");
            false
        }
    }
}

/// Publishes `processor` under `token` and returns its handle.
pub(crate) fn insert_processor(token: usize, processor: Processor) -> *mut ApProcessor {
    let entry = Arc::new(Mutex::new(ApProcessor { inner: processor }));
    lock(&PROCESSORS).insert(token, entry);
    as_handle(token)
}

fn find_processor(handle: *mut ApProcessor) -> Option<Arc<Mutex<ApProcessor>>> {
    lock(&PROCESSORS).get(&handle.addr()).cloned()
}

/// Runs `f` on the processor named by `handle`.
///
/// The table lock is released before `f` runs, so engine callbacks never
/// execute under it.
pub(crate) fn with_processor<R>(
    handle: *mut ApProcessor,
    f: impl FnOnce(&mut Processor) -> R,
) -> Result<R, Error> {
    if handle.is_null() {
        return Err(Error::InvalidHandle);
    }
    let entry = find_processor(handle).ok_or(Error::Released)?;
    let mut processor = lock(&entry);
    Ok(f(&mut processor.inner))
}

/// Unpublishes the processor named by `handle` and releases it.
pub(crate) fn remove_processor(handle: *mut ApProcessor) -> Result<(), Error> {
    if handle.is_null() {
        return Err(Error::InvalidHandle);
    }
    let entry = lock(&PROCESSORS)
        .remove(&handle.addr())
        .ok_or(Error::Released)?;
    lock(&entry).inner.release()
}

/// Serializes tests that touch the process-wide state and starts them
/// without a service.
#[cfg(test)]
pub(crate) fn serial() -> MutexGuard<'static, ()> {
    static TEST_LOCK: Mutex<()> = Mutex::new(());
    let guard = lock(&TEST_LOCK);
    drop(lock(&SERVICE).take());
    guard
}

/// Restores the default factory when dropped.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct FactoryGuard(EngineFactory);

#[cfg(test)]
impl FactoryGuard {
    pub(crate) fn install(factory: EngineFactory) -> Self {
        Self(set_engine_factory(factory))
    }
}

#[cfg(test)]
impl Drop for FactoryGuard {
    fn drop(&mut self) {
        set_engine_factory(self.0);
    }
}
