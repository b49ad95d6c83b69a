//! Per-tool result caching for interactive editing.
//!
//! Loop extraction and mirror derivation dominate the cost of re-running a
//! tool while the user drags a parameter. The host keeps one [`ToolCache`]
//! per editing session and consults it before recomputing; a cached entry is
//! only valid while its [`Fingerprint`] matches the current edit state, so a
//! changed selection or modifier setup invalidates it naturally.

use std::collections::HashMap;

use crate::algo::loops::{InputMode, Loop};
use crate::mesh::{DerivedMapping, EditMesh, ModifierStack, VertexId};

/// The tools whose loop lookups are cached independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Circle fitting.
    Circle,
    /// Curve smoothing.
    Curve,
    /// Flattening.
    Flatten,
    /// Loop relaxation.
    Relax,
    /// Even spacing.
    Space,
    /// Bevel reconstruction.
    Rebevel,
}

/// Everything a cached result depends on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint {
    /// Name of the edited object.
    pub object: String,
    /// Loop input mode the tool ran with.
    pub input_mode: Option<InputMode>,
    /// Whether boundary cutting was enabled.
    pub boundaries: bool,
    /// Sorted selected vertex indices.
    pub selected: Vec<usize>,
    /// Names of the visible mirror modifiers.
    pub mirrors: Vec<String>,
}

impl Fingerprint {
    /// Fingerprint of the current edit state.
    pub fn capture(
        object: impl Into<String>,
        mesh: &EditMesh,
        stack: &ModifierStack,
        input_mode: Option<InputMode>,
        boundaries: bool,
    ) -> Self {
        let mut selected = mesh.selected_vertex_indices();
        selected.sort_unstable();
        Self {
            object: object.into(),
            input_mode,
            boundaries,
            selected,
            mirrors: stack.visible_mirror_names(),
        }
    }
}

/// A cached loop lookup.
#[derive(Debug, Clone, Default)]
pub struct CachedLoops {
    /// Single vertices outside any loop (circle tool input).
    pub single_loops: Vec<VertexId>,
    /// The extracted loops.
    pub loops: Vec<Loop>,
    /// Mapping from the mirror-derived mesh, when one was used.
    pub mapping: Option<DerivedMapping>,
}

struct Entry {
    fingerprint: Fingerprint,
    result: CachedLoops,
}

/// Cache of the last loop lookup per tool.
#[derive(Default)]
pub struct ToolCache {
    entries: HashMap<ToolKind, Entry>,
    generation: u64,
}

impl ToolCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached result for `tool`, if its fingerprint still matches.
    pub fn read(&self, tool: ToolKind, fingerprint: &Fingerprint) -> Option<&CachedLoops> {
        let entry = self.entries.get(&tool)?;
        if &entry.fingerprint == fingerprint {
            Some(&entry.result)
        } else {
            None
        }
    }

    /// Store the result for `tool`, replacing any previous entry.
    pub fn write(&mut self, tool: ToolKind, fingerprint: Fingerprint, result: CachedLoops) {
        self.generation += 1;
        self.entries.insert(
            tool,
            Entry {
                fingerprint,
                result,
            },
        );
    }

    /// Drop the entry for one tool.
    pub fn delete(&mut self, tool: ToolKind) {
        if self.entries.remove(&tool).is_some() {
            self.generation += 1;
        }
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.generation += 1;
        }
        self.entries.clear();
    }

    /// Counter bumped by every mutation; hosts can use it to detect stale
    /// snapshots of the cache.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(selected: Vec<usize>) -> Fingerprint {
        Fingerprint {
            object: "Cube".into(),
            input_mode: Some(InputMode::Selected),
            boundaries: false,
            selected,
            mirrors: Vec::new(),
        }
    }

    fn loops() -> CachedLoops {
        CachedLoops {
            single_loops: Vec::new(),
            loops: vec![Loop::new(vec![VertexId::new(0), VertexId::new(1)], false)],
            mapping: None,
        }
    }

    #[test]
    fn test_hit_requires_matching_fingerprint() {
        let mut cache = ToolCache::new();
        cache.write(ToolKind::Relax, fingerprint(vec![0, 1, 2]), loops());

        assert!(cache.read(ToolKind::Relax, &fingerprint(vec![0, 1, 2])).is_some());
        // Different selection misses.
        assert!(cache.read(ToolKind::Relax, &fingerprint(vec![0, 1])).is_none());
        // Other tools are unaffected.
        assert!(cache.read(ToolKind::Space, &fingerprint(vec![0, 1, 2])).is_none());
    }

    #[test]
    fn test_delete_is_per_tool() {
        let mut cache = ToolCache::new();
        cache.write(ToolKind::Relax, fingerprint(vec![0]), loops());
        cache.write(ToolKind::Space, fingerprint(vec![0]), loops());

        cache.delete(ToolKind::Relax);
        assert!(cache.read(ToolKind::Relax, &fingerprint(vec![0])).is_none());
        assert!(cache.read(ToolKind::Space, &fingerprint(vec![0])).is_some());

        cache.clear();
        assert!(cache.read(ToolKind::Space, &fingerprint(vec![0])).is_none());
    }

    #[test]
    fn test_generation_counts_mutations() {
        let mut cache = ToolCache::new();
        assert_eq!(cache.generation(), 0);
        cache.write(ToolKind::Circle, Fingerprint::default(), CachedLoops::default());
        assert_eq!(cache.generation(), 1);
        // Deleting a missing entry is not a mutation.
        cache.delete(ToolKind::Space);
        assert_eq!(cache.generation(), 1);
        cache.clear();
        assert_eq!(cache.generation(), 2);
    }
}
