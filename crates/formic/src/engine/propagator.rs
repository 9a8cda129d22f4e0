use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use serde_json::Value as Json;

use super::tree::{Target, Tree, resolve};
use crate::error::{CompileError, DivergenceError};
use crate::expr::PathCatalog;
use crate::schema::{
    CompiledUnion, Derived, GATE_OPTIONS, Gate, Watch, compile_gate, compile_union, compile_value,
    compile_watch,
};
use crate::value::Value;

/// Default cap on update batches per flush before a chain is declared
/// divergent.
pub const DEFAULT_BATCH_CEILING: u32 = 100;

pub type NodeId = u32;

/// One schedulable computed option of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    Gate(u8),
    Value,
    Watch,
    Branch,
}

/// Which branches of a union are active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BranchSelection {
    /// `oneOf`: the first matching branch, if any.
    Index(Option<usize>),
    /// `anyOf`/`allOf`: every matching branch, in branch order.
    Indices(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChangeEvent {
    ValueChanged {
        path: String,
        value: Value,
    },
    GateChanged {
        path: String,
        gate: &'static str,
        state: bool,
    },
    WatchFired {
        path: String,
        values: Vec<Value>,
    },
    BranchChanged {
        path: String,
        selection: BranchSelection,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnionMode {
    First,
    All,
}

#[derive(Debug)]
struct GateSlot {
    name: &'static str,
    gate: Gate,
    current: Option<bool>,
}

#[derive(Debug)]
struct WatchSlot {
    watch: Watch,
    current: Option<Vec<Value>>,
}

#[derive(Debug)]
struct UnionSlot {
    union: CompiledUnion,
    mode: UnionMode,
    current: Option<BranchSelection>,
}

#[derive(Debug)]
struct ComputedNode {
    path: String,
    /// Catalog order: index `i` is dependency `i` of every option.
    dep_targets: Vec<Target>,
    gates: Vec<GateSlot>,
    derived: Option<Derived>,
    watch: Option<WatchSlot>,
    union: Option<UnionSlot>,
}

/// The reactive engine: a value tree plus compiled computed options,
/// evaluated in deferred batches.
///
/// External writes commit immediately and schedule dependents; nothing
/// evaluates until [`Engine::flush`]. One batch evaluates each scheduled
/// option at most once; re-triggers discovered mid-batch join the
/// current batch unless the option already ran, in which case they roll
/// over to the next one.
#[derive(Debug)]
pub struct Engine {
    tree: Tree,
    nodes: Vec<ComputedNode>,
    by_path: HashMap<String, NodeId>,
    /// Reverse index: target display path to the options reading it.
    dependents: HashMap<String, Vec<(NodeId, OptionKey)>>,
    scheduled: VecDeque<(NodeId, OptionKey)>,
    deferred: Vec<(NodeId, OptionKey)>,
    ran_this_batch: Vec<(NodeId, OptionKey)>,
    in_batch: bool,
    events: Vec<ChangeEvent>,
    /// Per-flush index of the pending `ValueChanged` event for each path.
    /// Repeated commits to one path within a flush collapse into a
    /// single event carrying the settled value.
    value_event_slots: HashMap<String, usize>,
    batch_ceiling: u32,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            tree: Tree::new(),
            nodes: Vec::new(),
            by_path: HashMap::new(),
            dependents: HashMap::new(),
            scheduled: VecDeque::new(),
            deferred: Vec::new(),
            ran_this_batch: Vec::new(),
            in_batch: false,
            events: Vec::new(),
            value_event_slots: HashMap::new(),
            batch_ceiling: DEFAULT_BATCH_CEILING,
        }
    }

    pub fn with_batch_ceiling(mut self, ceiling: u32) -> Self {
        self.batch_ceiling = ceiling;
        self
    }

    /// Compile the computed surface of one schema node anchored at
    /// `path`. All options share one catalog, so one dependency array
    /// serves the whole node.
    pub fn add_node(&mut self, path: &str, schema: &Json) -> Result<NodeId, CompileError> {
        let mut catalog = PathCatalog::new();

        let mut gates = Vec::new();
        for name in GATE_OPTIONS {
            if let Some(gate) = compile_gate(schema, name, &mut catalog)? {
                gates.push(GateSlot {
                    name,
                    gate,
                    current: None,
                });
            }
        }
        let derived = compile_value(schema, &mut catalog)?;
        let watch = compile_watch(schema, &mut catalog)?.map(|watch| WatchSlot {
            watch,
            current: None,
        });

        let mut union = None;
        for (field, mode) in [
            ("oneOf", UnionMode::First),
            ("anyOf", UnionMode::All),
            ("allOf", UnionMode::All),
        ] {
            if let Some(compiled) = compile_union(schema, field, "condition", &mut catalog)? {
                union = Some(UnionSlot {
                    union: compiled,
                    mode,
                    current: None,
                });
                break;
            }
        }

        let dep_targets: Vec<Target> =
            catalog.iter().map(|token| resolve(path, token)).collect();

        let id = self.nodes.len() as NodeId;
        for (index, slot) in gates.iter().enumerate() {
            self.register(id, OptionKey::Gate(index as u8), slot.gate.deps(), &dep_targets);
        }
        if let Some(derived) = &derived {
            self.register(id, OptionKey::Value, derived.deps(), &dep_targets);
        }
        if let Some(slot) = &watch {
            self.register(id, OptionKey::Watch, slot.watch.deps(), &dep_targets);
        }
        if let Some(slot) = &union {
            self.register(id, OptionKey::Branch, &slot.union.deps, &dep_targets);
        }

        log::debug!(
            "registered node {path}: {} gates, derived: {}, watch: {}, union: {}, {} dependencies",
            gates.len(),
            derived.is_some(),
            watch.is_some(),
            union.is_some(),
            dep_targets.len(),
        );

        self.by_path.insert(path.to_string(), id);
        self.nodes.push(ComputedNode {
            path: path.to_string(),
            dep_targets,
            gates,
            derived,
            watch,
            union,
        });
        Ok(id)
    }

    fn register(&mut self, id: NodeId, option: OptionKey, deps: &[u32], targets: &[Target]) {
        for &dep in deps {
            let Some(target) = targets.get(dep as usize) else {
                continue;
            };
            let entries = self
                .dependents
                .entry(target.display().to_string())
                .or_default();
            if !entries.contains(&(id, option)) {
                entries.push((id, option));
            }
        }
    }

    /// External write: commits immediately, evaluation is deferred.
    pub fn set_value(&mut self, path: &str, value: Value) {
        self.tree.set(path, value);
        self.invalidate(path);
    }

    pub fn set_context(&mut self, context: Value) {
        self.tree.set_context(context);
        self.invalidate("@");
    }

    /// Schedule every computed option once, for the initial pass over a
    /// freshly registered tree.
    pub fn prime(&mut self) {
        for id in 0..self.nodes.len() as NodeId {
            let gate_count = self.nodes[id as usize].gates.len();
            for index in 0..gate_count {
                self.schedule((id, OptionKey::Gate(index as u8)));
            }
            if self.nodes[id as usize].derived.is_some() {
                self.schedule((id, OptionKey::Value));
            }
            if self.nodes[id as usize].watch.is_some() {
                self.schedule((id, OptionKey::Watch));
            }
            if self.nodes[id as usize].union.is_some() {
                self.schedule((id, OptionKey::Branch));
            }
        }
    }

    fn invalidate(&mut self, key: &str) {
        let Some(entries) = self.dependents.get(key) else {
            return;
        };
        for entry in entries.clone() {
            self.schedule(entry);
        }
    }

    fn schedule(&mut self, entry: (NodeId, OptionKey)) {
        // An option that already ran this batch rolls over to the next
        // batch; anything else joins the pending queue.
        if self.in_batch && self.ran_this_batch.contains(&entry) {
            if !self.deferred.contains(&entry) {
                self.deferred.push(entry);
            }
        } else if !self.scheduled.contains(&entry) {
            self.scheduled.push_back(entry);
        }
    }

    /// Drain scheduled work until quiescence or the batch ceiling.
    ///
    /// On divergence the queues are dropped and the chain's node is
    /// reported; values committed so far stay committed.
    pub fn flush(&mut self) -> Result<(), DivergenceError> {
        self.value_event_slots.clear();
        let mut batches: u32 = 0;
        while !self.scheduled.is_empty() || !self.deferred.is_empty() {
            if self.scheduled.is_empty() {
                self.scheduled.extend(self.deferred.drain(..));
            }
            batches += 1;
            if batches > self.batch_ceiling {
                let (id, _) = self.scheduled[0];
                let node = &self.nodes[id as usize];
                let error = DivergenceError {
                    node_path: node.path.clone(),
                    dependency_paths: node
                        .dep_targets
                        .iter()
                        .map(|target| target.display().to_string())
                        .collect(),
                    batches: self.batch_ceiling,
                };
                log::warn!("{error}");
                self.scheduled.clear();
                self.deferred.clear();
                self.in_batch = false;
                return Err(error);
            }

            self.in_batch = true;
            self.ran_this_batch.clear();
            while let Some(entry) = self.scheduled.pop_front() {
                self.ran_this_batch.push(entry);
                self.evaluate(entry.0, entry.1);
            }
            self.in_batch = false;
        }
        if batches > 0 {
            log::debug!("flush settled after {batches} batches");
        }
        Ok(())
    }

    fn evaluate(&mut self, id: NodeId, option: OptionKey) {
        let deps: Vec<Value> = {
            let node = &self.nodes[id as usize];
            node.dep_targets
                .iter()
                .map(|target| self.tree.read(target).clone())
                .collect()
        };

        match option {
            OptionKey::Gate(index) => {
                let node = &self.nodes[id as usize];
                let Some(slot) = node.gates.get(index as usize) else {
                    return;
                };
                let state = slot.gate.eval(&deps);
                if slot.current == Some(state) {
                    return;
                }
                let path = node.path.clone();
                let name = slot.name;
                self.nodes[id as usize].gates[index as usize].current = Some(state);
                self.events.push(ChangeEvent::GateChanged {
                    path,
                    gate: name,
                    state,
                });
            }
            OptionKey::Value => {
                let node = &self.nodes[id as usize];
                let Some(derived) = &node.derived else {
                    return;
                };
                let value = derived.eval(&deps);
                // The sentinel means "keep the current value".
                if matches!(value, Value::SelfRef) {
                    return;
                }
                let path = node.path.clone();
                if *self.tree.get(&path) == value {
                    log::debug!("suppressed unchanged value for {path}");
                    return;
                }
                self.tree.set(&path, value.clone());
                match self.value_event_slots.get(&path) {
                    Some(&slot) => {
                        self.events[slot] = ChangeEvent::ValueChanged {
                            path: path.clone(),
                            value,
                        };
                    }
                    None => {
                        self.value_event_slots.insert(path.clone(), self.events.len());
                        self.events.push(ChangeEvent::ValueChanged {
                            path: path.clone(),
                            value,
                        });
                    }
                }
                self.invalidate(&path);
            }
            OptionKey::Watch => {
                let node = &self.nodes[id as usize];
                let Some(slot) = &node.watch else {
                    return;
                };
                let values = slot.watch.eval(&deps);
                if slot.current.as_ref() == Some(&values) {
                    return;
                }
                let path = node.path.clone();
                if let Some(slot) = self.nodes[id as usize].watch.as_mut() {
                    slot.current = Some(values.clone());
                }
                self.events.push(ChangeEvent::WatchFired { path, values });
            }
            OptionKey::Branch => {
                let node = &self.nodes[id as usize];
                let Some(slot) = &node.union else {
                    return;
                };
                let selection = match slot.mode {
                    UnionMode::First => BranchSelection::Index(slot.union.first_match(&deps)),
                    UnionMode::All => BranchSelection::Indices(slot.union.all_matches(&deps)),
                };
                if slot.current.as_ref() == Some(&selection) {
                    return;
                }
                let path = node.path.clone();
                if let Some(slot) = self.nodes[id as usize].union.as_mut() {
                    slot.current = Some(selection.clone());
                }
                self.events.push(ChangeEvent::BranchChanged { path, selection });
            }
        }
    }

    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn value(&self, path: &str) -> &Value {
        self.tree.get(path)
    }

    pub fn context(&self) -> &Value {
        self.tree.context()
    }

    pub fn gate(&self, path: &str, name: &str) -> Option<bool> {
        let id = self.by_path.get(path)?;
        self.nodes[*id as usize]
            .gates
            .iter()
            .find(|slot| slot.name == name)
            .and_then(|slot| slot.current)
    }

    pub fn branch(&self, path: &str) -> Option<&BranchSelection> {
        let id = self.by_path.get(path)?;
        self.nodes[*id as usize]
            .union
            .as_ref()
            .and_then(|slot| slot.current.as_ref())
    }

    pub fn watched(&self, path: &str) -> Option<&[Value]> {
        let id = self.by_path.get(path)?;
        self.nodes[*id as usize]
            .watch
            .as_ref()
            .and_then(|slot| slot.current.as_deref())
    }

    /// Snapshot of every stored value, keyed by absolute path.
    pub fn export_values(&self) -> Json {
        let mut object = serde_json::Map::new();
        let mut entries: Vec<_> = self.tree.entries().collect();
        entries.sort_by_key(|(path, _)| *path);
        for (path, value) in entries {
            object.insert(path.to_string(), value.to_json());
        }
        Json::Object(object)
    }

    /// Bulk-load values from a path-keyed object; each write schedules
    /// dependents like any external write.
    pub fn import_values(&mut self, values: &Json) {
        let Json::Object(entries) = values else {
            return;
        };
        for (path, value) in entries {
            self.set_value(path, Value::from_json(value));
        }
    }
}
