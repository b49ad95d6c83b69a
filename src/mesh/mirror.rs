//! Mirror-modifier evaluation and derived-mesh mapping.
//!
//! When a mirror modifier is visible on the host object, loop detection runs
//! on a *derived* (doubled) mesh so that loops crossing the mirror plane are
//! seen whole, then maps results back to the original vertices. Deriving
//! temporarily flips modifier flags: every non-mirror modifier is hidden, and
//! mirror merging can be suppressed. The prior flags are restored
//! unconditionally through a drop guard, so no early return or error can
//! leave the stack corrupted.

use crate::error::Result;
use crate::mesh::{EditMesh, VertexId};

/// Tolerance for matching a derived vertex back to an original one.
const MATCH_EPSILON: f64 = 1e-6;

/// Axis a mirror modifier reflects across.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAxis {
    /// Reflect x.
    X,
    /// Reflect y.
    Y,
    /// Reflect z.
    Z,
}

impl MirrorAxis {
    #[inline]
    fn component(self) -> usize {
        match self {
            MirrorAxis::X => 0,
            MirrorAxis::Y => 1,
            MirrorAxis::Z => 2,
        }
    }
}

/// One entry in the host's modifier stack.
#[derive(Debug, Clone)]
pub enum Modifier {
    /// A mirror modifier this crate evaluates itself.
    Mirror {
        /// Modifier name, used in cache fingerprints.
        name: String,
        /// Reflection axis.
        axis: MirrorAxis,
        /// Weld vertices near the mirror plane instead of doubling them.
        use_merge: bool,
        /// Distance from the plane within which merging applies.
        merge_threshold: f64,
        /// Viewport visibility flag.
        show_viewport: bool,
    },
    /// Any other (deforming) modifier; opaque here, disabled during
    /// derivation.
    Other {
        /// Modifier name.
        name: String,
        /// Viewport visibility flag.
        show_viewport: bool,
    },
}

impl Modifier {
    /// The modifier's name.
    pub fn name(&self) -> &str {
        match self {
            Modifier::Mirror { name, .. } | Modifier::Other { name, .. } => name,
        }
    }

    fn show_viewport(&self) -> bool {
        match self {
            Modifier::Mirror { show_viewport, .. } | Modifier::Other { show_viewport, .. } => {
                *show_viewport
            }
        }
    }
}

/// The host object's modifier stack.
#[derive(Debug, Clone, Default)]
pub struct ModifierStack {
    /// Modifiers in evaluation order.
    pub modifiers: Vec<Modifier>,
}

impl ModifierStack {
    /// Whether any visible mirror modifier is present.
    pub fn has_visible_mirror(&self) -> bool {
        self.modifiers
            .iter()
            .any(|m| matches!(m, Modifier::Mirror { .. }) && m.show_viewport())
    }

    /// Names of the visible mirror modifiers, in stack order.
    pub fn visible_mirror_names(&self) -> Vec<String> {
        self.modifiers
            .iter()
            .filter(|m| matches!(m, Modifier::Mirror { .. }) && m.show_viewport())
            .map(|m| m.name().to_string())
            .collect()
    }
}

/// Restores modifier visibility and merge flags when dropped.
struct StackGuard<'a> {
    stack: &'a mut ModifierStack,
    show_viewport: Vec<bool>,
    use_merge: Vec<Option<bool>>,
}

impl<'a> StackGuard<'a> {
    fn new(stack: &'a mut ModifierStack, suppress_merge: bool) -> Self {
        let show_viewport: Vec<bool> =
            stack.modifiers.iter().map(|m| m.show_viewport()).collect();
        let use_merge: Vec<Option<bool>> = stack
            .modifiers
            .iter()
            .map(|m| match m {
                Modifier::Mirror { use_merge, .. } => Some(*use_merge),
                Modifier::Other { .. } => None,
            })
            .collect();

        for modifier in &mut stack.modifiers {
            match modifier {
                Modifier::Other { show_viewport, .. } => *show_viewport = false,
                Modifier::Mirror { use_merge, .. } => {
                    if suppress_merge {
                        *use_merge = false;
                    }
                }
            }
        }

        Self {
            stack,
            show_viewport,
            use_merge,
        }
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        for (i, modifier) in self.stack.modifiers.iter_mut().enumerate() {
            match modifier {
                Modifier::Mirror {
                    show_viewport,
                    use_merge,
                    ..
                } => {
                    *show_viewport = self.show_viewport[i];
                    if let Some(merge) = self.use_merge[i] {
                        *use_merge = merge;
                    }
                }
                Modifier::Other { show_viewport, .. } => {
                    *show_viewport = self.show_viewport[i];
                }
            }
        }
    }
}

/// Mapping from derived vertex indices back to original vertices.
///
/// A `None` entry means the derived vertex lies strictly on the virtual
/// (mirrored) side and has no original counterpart.
#[derive(Debug, Clone, Default)]
pub struct DerivedMapping {
    map: Vec<Option<VertexId>>,
}

impl DerivedMapping {
    /// Identity mapping for operating directly on the original mesh.
    pub fn identity(num_vertices: usize) -> Self {
        Self {
            map: (0..num_vertices).map(|i| Some(VertexId::new(i))).collect(),
        }
    }

    /// Build the mapping by nearest-position matching within 1e-6.
    ///
    /// Candidates are the original mesh's non-hidden vertices; with
    /// `full_search` false, only selected ones (the usual case: loops are
    /// found among the selection).
    pub fn build(original: &EditMesh, derived: &EditMesh, full_search: bool) -> Self {
        let candidates: Vec<VertexId> = original
            .vertex_ids()
            .filter(|&v| {
                let vert = original.vertex(v);
                !vert.hide && (full_search || vert.select)
            })
            .collect();

        let mut used = vec![false; candidates.len()];
        let map = derived
            .vertex_ids()
            .map(|dv| {
                let p = derived.position(dv);
                for (slot, &ov) in candidates.iter().enumerate() {
                    if !used[slot] && (original.position(ov) - p).norm() < MATCH_EPSILON {
                        used[slot] = true;
                        return Some(ov);
                    }
                }
                None
            })
            .collect();
        Self { map }
    }

    /// The original vertex for a derived vertex, if any.
    #[inline]
    pub fn original(&self, derived: VertexId) -> Option<VertexId> {
        self.map.get(derived.index()).copied().flatten()
    }

    /// Number of derived vertices covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the mapping is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Evaluate the visible mirror modifiers of `stack` over `mesh`.
///
/// Returns the derived mesh and its mapping back to `mesh`, or `None` when no
/// visible mirror modifier exists (the caller then works on the original
/// directly). With `suppress_merge`, mirror merging is disabled during
/// evaluation so center vertices stay distinct. All modifier flags are
/// restored before returning, on every path.
pub fn derive_mirrored(
    mesh: &EditMesh,
    stack: &mut ModifierStack,
    suppress_merge: bool,
    full_search: bool,
) -> Result<Option<(EditMesh, DerivedMapping)>> {
    if !stack.has_visible_mirror() {
        return Ok(None);
    }

    let guard = StackGuard::new(stack, suppress_merge);

    let mut derived = mesh.clone();
    for modifier in &guard.stack.modifiers {
        if let Modifier::Mirror {
            axis,
            use_merge,
            merge_threshold,
            show_viewport: true,
            ..
        } = modifier
        {
            derived = apply_mirror(&derived, *axis, *use_merge, *merge_threshold);
        }
    }

    let mapping = DerivedMapping::build(mesh, &derived, full_search);
    drop(guard);
    Ok(Some((derived, mapping)))
}

/// Double a mesh across a mirror plane through the origin.
fn apply_mirror(mesh: &EditMesh, axis: MirrorAxis, use_merge: bool, threshold: f64) -> EditMesh {
    let component = axis.component();
    let mut out = mesh.clone();

    // Per-vertex image on the mirrored side; merged vertices map to
    // themselves.
    let mut image = Vec::with_capacity(mesh.num_vertices());
    for v in mesh.vertex_ids() {
        let vert = mesh.vertex(v);
        if use_merge && vert.position[component].abs() <= threshold {
            image.push(v);
        } else {
            let mut position = vert.position;
            position[component] = -position[component];
            let new = out.add_vertex(position);
            out.vertex_mut(new).select = vert.select;
            out.vertex_mut(new).hide = vert.hide;
            image.push(new);
        }
    }

    for edge in mesh.edges() {
        let [a, b] = edge.verts;
        let (ma, mb) = (image[a.index()], image[b.index()]);
        if (ma, mb) != (a, b) && (ma, mb) != (b, a) {
            let id = out.add_edge(ma, mb);
            out.edges_mut_vec()[id].select = edge.select;
            out.edges_mut_vec()[id].hide = edge.hide;
        }
    }

    for face in mesh.faces() {
        // Reverse winding so mirrored faces keep outward normals.
        let verts: Vec<VertexId> = face
            .verts
            .iter()
            .rev()
            .map(|v| image[v.index()])
            .collect();
        if verts != face.verts {
            out.faces_mut_vec().push(crate::mesh::Face {
                verts,
                select: face.select,
                hide: face.hide,
            });
        }
    }

    out
}
