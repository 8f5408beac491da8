// In-process real-time store: a JSON tree plus listeners.
// Every commit (single set or multi-path update) is applied and dispatched
// under one lock so listeners see writes in commit order.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::Clock;
use crate::backend::path;
use crate::backend::push_id::PushIdGenerator;
use crate::backend::{EventKind, RealtimeStore, ServerValue, StoreEvent, Subscription, Updates};
use crate::error::{BackendError, BackendResult};

struct Listener {
    id: u64,
    path: String,
    kind: EventKind,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

#[derive(Default)]
struct StoreState {
    root: Value,
    listeners: Vec<Listener>,
    next_listener_id: u64,
    push_ids: PushIdGenerator,
}

pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    clock: Clock,
}

impl MemoryStore {
    pub fn new(clock: Clock) -> Self {
        MemoryStore {
            state: Arc::new(Mutex::new(StoreState {
                root: Value::Object(Map::new()),
                ..Default::default()
            })),
            clock,
        }
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    /// Synchronous read, for callers outside an async context.
    pub fn snapshot(&self, path: &str) -> BackendResult<Option<Value>> {
        let segs = path::segments(path)?;
        Ok(lookup(&lock(&self.state).root, &segs).cloned())
    }

    fn commit(&self, writes: Vec<(String, Value)>) -> BackendResult<()> {
        let mut state = lock(&self.state);
        let now = (self.clock)();

        let mut resolved = Vec::with_capacity(writes.len());
        for (target, value) in writes {
            let value = prune(resolve_server_values(value, now));
            validate_keys(&target, &value)?;
            resolved.push((target, value));
        }

        // Capture what each affected listener currently sees
        let affected: Vec<(usize, Option<Value>)> = state
            .listeners
            .iter()
            .enumerate()
            .filter(|(_, l)| resolved.iter().any(|(p, _)| path::related(p, &l.path)))
            .map(|(i, l)| (i, lookup_path(&state.root, &l.path).cloned()))
            .collect();

        for (target, value) in resolved {
            let segs: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
            write(&mut state.root, &segs, value);
        }

        let mut closed = Vec::new();
        for (index, before) in affected {
            let listener = &state.listeners[index];
            let after = lookup_path(&state.root, &listener.path);
            for event in diff(listener.kind, before.as_ref(), after) {
                if listener.tx.send(event).is_err() {
                    closed.push(listener.id);
                    break;
                }
            }
        }

        if !closed.is_empty() {
            debug!("Dropping {} listeners whose receivers are gone", closed.len());
            state.listeners.retain(|l| !closed.contains(&l.id));
        }
        Ok(())
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn get(&self, path: &str) -> BackendResult<Option<Value>> {
        self.snapshot(path)
    }

    async fn set(&self, path: &str, value: Value) -> BackendResult<()> {
        let target = path::normalize(path)?;
        debug!("set '{}'", target);
        self.commit(vec![(target, value)])
    }

    async fn update(&self, updates: Updates) -> BackendResult<()> {
        let mut writes = Vec::with_capacity(updates.len());
        for (raw, value) in updates {
            let target = path::normalize(&raw)?;
            if target.is_empty() {
                return Err(BackendError::InvalidPath(raw));
            }
            writes.push((target, value));
        }

        for (i, (a, _)) in writes.iter().enumerate() {
            for (b, _) in writes.iter().skip(i + 1) {
                if path::related(a, b) {
                    warn!("Rejecting multi-path update: '{}' overlaps '{}'", a, b);
                    return Err(BackendError::OverlappingPaths(a.clone(), b.clone()));
                }
            }
        }

        debug!("update {} paths", writes.len());
        self.commit(writes)
    }

    fn push_key(&self, path: &str) -> BackendResult<String> {
        path::normalize(path)?;
        let now = (self.clock)();
        Ok(lock(&self.state).push_ids.generate(now))
    }

    fn subscribe(&self, path: &str, kind: EventKind) -> BackendResult<Subscription> {
        let target = path::normalize(path)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = lock(&self.state);
        let id = state.next_listener_id;
        state.next_listener_id += 1;

        // Initial events are queued before any later commit can run
        let current = lookup_path(&state.root, &target);
        let initial = match kind {
            EventKind::ChildAdded => diff(kind, None, current),
            EventKind::Value => vec![StoreEvent {
                kind,
                key: None,
                value: current.cloned().unwrap_or(Value::Null),
            }],
            EventKind::ChildChanged | EventKind::ChildRemoved => Vec::new(),
        };
        for event in initial {
            let _ = tx.send(event);
        }

        state.listeners.push(Listener { id, path: target.clone(), kind, tx });
        drop(state);
        debug!("Attached {:?} listener {} on '{}'", kind, id, target);

        let weak: Weak<Mutex<StoreState>> = Arc::downgrade(&self.state);
        let detach = Box::new(move || {
            if let Some(state) = weak.upgrade() {
                lock(&state).listeners.retain(|l| l.id != id);
            }
        });
        Ok(Subscription::new(target, kind, rx, detach))
    }
}

fn lock(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lookup<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    let mut node = root;
    for seg in segs {
        node = node.as_object()?.get(*seg)?;
    }
    if is_empty(node) {
        None
    } else {
        Some(node)
    }
}

fn lookup_path<'a>(root: &'a Value, target: &str) -> Option<&'a Value> {
    let segs: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    lookup(root, &segs)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Write `value` at `segs`, creating parents as needed. Empty values delete
/// and prune parents left without children.
fn write(node: &mut Value, segs: &[&str], value: Value) {
    let Some((first, rest)) = segs.split_first() else {
        *node = if is_empty(&value) { Value::Object(Map::new()) } else { value };
        return;
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Some(map) = node.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        if is_empty(&value) {
            map.remove(*first);
        } else {
            map.insert(first.to_string(), value);
        }
        return;
    }

    let child = map
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    write(child, rest, value);
    if is_empty(child) {
        map.remove(*first);
    }
}

fn resolve_server_values(value: Value, now: i64) -> Value {
    if ServerValue::is_timestamp(&value) {
        return Value::from(now);
    }
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, resolve_server_values(v, now)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items.into_iter().map(|v| resolve_server_values(v, now)).collect(),
        ),
        other => other,
    }
}

/// Drop null members and objects left empty by that.
fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect();
            Value::Object(kept)
        }
        other => other,
    }
}

fn validate_keys(target: &str, value: &Value) -> BackendResult<()> {
    if let Value::Object(map) = value {
        for (key, child) in map {
            if path::segments(key)?.len() != 1 {
                return Err(BackendError::InvalidPath(format!("{}/{}", target, key)));
            }
            validate_keys(target, child)?;
        }
    }
    Ok(())
}

fn diff(kind: EventKind, before: Option<&Value>, after: Option<&Value>) -> Vec<StoreEvent> {
    if kind == EventKind::Value {
        if before == after {
            return Vec::new();
        }
        return vec![StoreEvent {
            kind,
            key: None,
            value: after.cloned().unwrap_or(Value::Null),
        }];
    }

    let empty = Map::new();
    let old = before.and_then(Value::as_object).unwrap_or(&empty);
    let new = after.and_then(Value::as_object).unwrap_or(&empty);

    // Map iteration is key-ordered, so push keys come out in creation order
    match kind {
        EventKind::ChildAdded => new
            .iter()
            .filter(|(k, _)| !old.contains_key(*k))
            .map(|(k, v)| child_event(kind, k, v))
            .collect(),
        EventKind::ChildChanged => new
            .iter()
            .filter(|(k, v)| old.get(*k).map_or(false, |prev| prev != *v))
            .map(|(k, v)| child_event(kind, k, v))
            .collect(),
        EventKind::ChildRemoved => old
            .iter()
            .filter(|(k, _)| !new.contains_key(*k))
            .map(|(k, v)| child_event(kind, k, v))
            .collect(),
        EventKind::Value => Vec::new(),
    }
}

fn child_event(kind: EventKind, key: &str, value: &Value) -> StoreEvent {
    StoreEvent {
        kind,
        key: Some(key.to_string()),
        value: value.clone(),
    }
}
