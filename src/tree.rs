//! Dual adaptive octree construction (spec.md §4.B).
//!
//! Sources and targets are refined together, level by level: a target box
//! subdivides only when it is overfull *and* some colleague source box is
//! also overfull, and a source box subdivides only when some target box
//! that lists it as a colleague demands it (spec.md §3 invariant 3). That
//! mutual criterion, not either tree's point count alone, is the sole
//! trigger for going one level deeper.

use std::ops::Range;

#[cfg(feature = "encode")]
use bincode::{Decode, Encode};

use crate::error::{FmmError, FmmResult};
use crate::geometry::BoundingCube;
use crate::points::PointSet;

/// Hard refinement-depth cap (spec.md §4.B). Reaching it means points are
/// duplicated or pathologically coincident beyond what `leaf_capacity` can
/// absorb.
pub const MAX_LEVEL: u32 = 128;

/// One node of a source or target octree (spec.md §3 "Box").
#[derive(Debug, Clone)]
#[cfg_attr(feature = "encode", derive(Encode, Decode))]
pub struct Box {
    pub level: u32,
    pub boxid: usize,
    pub parent: Option<usize>,
    pub child: [Option<usize>; 8],
    pub nchild: u8,
    pub idx: i32,
    pub idy: i32,
    pub idz: i32,
    pub npts: usize,
    pub addr: usize,

    /// Populated only on target boxes; empty on source boxes.
    pub list1: Vec<usize>,
    pub list3: Vec<usize>,
    pub list4: Vec<usize>,
    pub list5: Vec<usize>,
}

impl Box {
    fn leaf(
        level: u32,
        boxid: usize,
        parent: Option<usize>,
        idx: i32,
        idy: i32,
        idz: i32,
        npts: usize,
        addr: usize,
    ) -> Self {
        Self {
            level,
            boxid,
            parent,
            child: [None; 8],
            nchild: 0,
            idx,
            idy,
            idz,
            npts,
            addr,
            list1: Vec::new(),
            list3: Vec::new(),
            list4: Vec::new(),
            list5: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.nchild == 0
    }

    pub fn grid(&self) -> (i32, i32, i32) {
        (self.idx, self.idy, self.idz)
    }

    pub fn children(&self) -> impl Iterator<Item = usize> + '_ {
        self.child.iter().filter_map(|c| *c)
    }
}

/// A single tree (boxid → [`Box`], densely indexed so `boxes[boxid]` is a
/// flat lookup, plus each level's contiguous boxid range).
#[derive(Debug, Clone)]
pub struct Tree {
    pub boxes: Vec<Box>,
    pub level_ranges: Vec<Range<usize>>,
}

impl Tree {
    pub fn root(&self) -> &Box {
        &self.boxes[0]
    }

    pub fn get(&self, boxid: usize) -> &Box {
        &self.boxes[boxid]
    }

    pub fn max_level(&self) -> u32 {
        self.level_ranges.len() as u32 - 1
    }

    /// Depth-first, parent-before-child iteration over boxids (the order
    /// spec.md §4.B's list-building recursion and §4.G's `Loc` tasks need).
    pub fn preorder(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.boxes.len());
        let mut stack = vec![0usize];
        while let Some(b) = stack.pop() {
            out.push(b);
            // push children in reverse so they pop in ascending octant order
            for c in self.boxes[b].child.iter().rev().filter_map(|c| *c) {
                stack.push(c);
            }
        }
        out
    }

    /// Leaves-first, children-before-parent order (the order spec.md §4.G's
    /// `Mult`/`Expo` tasks need).
    pub fn postorder(&self) -> Vec<usize> {
        let mut order = self.preorder();
        order.reverse();
        order
    }
}

pub struct DualTree {
    pub sources: Tree,
    pub targets: Tree,
}

/// Adjacency predicate (spec.md §3 invariant 5), symmetric in which box is
/// coarser.
pub fn adjacent(level1: u32, grid1: (i32, i32, i32), level2: u32, grid2: (i32, i32, i32)) -> bool {
    let ((lo_level, lo), (hi_level, hi)) = if level1 <= level2 {
        ((level1, grid1), (level2, grid2))
    } else {
        ((level2, grid2), (level1, grid1))
    };
    let d = 1i32 << (hi_level - lo_level);
    let within = |a: i32, b: i32| d * a - 1 <= b && b <= d * a + d;
    within(lo.0, hi.0) && within(lo.1, hi.1) && within(lo.2, hi.2)
}

struct Frontier {
    /// boxids at the current level, for source and target trees respectively.
    sources: Vec<usize>,
    targets: Vec<usize>,
}

/// Builds both trees in lock-step, reordering `sources`/`targets` in place
/// so that each box's points end up contiguous (spec.md §4.B).
pub fn build(
    sources: &mut PointSet,
    targets: &mut PointSet,
    cube: &BoundingCube,
    leaf_capacity: usize,
) -> FmmResult<DualTree> {
    let mut source_boxes = vec![Box::leaf(0, 0, None, 0, 0, 0, sources.len(), 0)];
    let mut target_boxes = vec![Box::leaf(0, 0, None, 0, 0, 0, targets.len(), 0)];
    target_boxes[0].list5 = vec![0];

    let mut source_ranges = vec![0..1usize];
    let mut target_ranges = vec![0..1usize];

    let mut frontier = Frontier {
        sources: vec![0],
        targets: vec![0],
    };

    let mut level = 0u32;
    loop {
        if level >= MAX_LEVEL {
            return Err(FmmError::TooDeep);
        }

        // Step 1: mark targets for subdivision under the dual criterion.
        let target_marked: Vec<bool> = frontier
            .targets
            .iter()
            .map(|&t| {
                let tb = &target_boxes[t];
                tb.npts > leaf_capacity
                    && tb
                        .list5
                        .iter()
                        .any(|&s| source_boxes[s].npts > leaf_capacity)
            })
            .collect();

        if target_marked.iter().all(|&m| !m) {
            break;
        }

        // A source box subdivides iff some marked target lists it as a colleague.
        let mut source_marked = vec![false; source_boxes.len()];
        for (i, &t) in frontier.targets.iter().enumerate() {
            if target_marked[i] {
                for &s in &target_boxes[t].list5 {
                    source_marked[s] = true;
                }
            }
        }

        // Step 2/3: subdivide marked source boxes.
        let mut new_source_frontier = Vec::new();
        for &s in &frontier.sources {
            if source_marked[s] {
                subdivide(&mut source_boxes, sources, cube, s, level + 1, &mut new_source_frontier);
            }
        }

        // Step 4: subdivide marked target boxes, then compute each child's list5.
        let mut new_target_frontier = Vec::new();
        for (i, &t) in frontier.targets.iter().enumerate() {
            if target_marked[i] {
                subdivide(&mut target_boxes, targets, cube, t, level + 1, &mut new_target_frontier);
                let parent_list5 = target_boxes[t].list5.clone();
                for child_idx in target_boxes[t].children().collect::<Vec<_>>() {
                    let child_grid = target_boxes[child_idx].grid();
                    let mut list5 = Vec::new();
                    for &sp in &parent_list5 {
                        for sc in source_boxes[sp].children() {
                            if adjacent(level + 1, child_grid, level + 1, source_boxes[sc].grid()) {
                                list5.push(sc);
                            }
                        }
                    }
                    target_boxes[child_idx].list5 = list5;
                }
            }
        }

        if new_source_frontier.is_empty() && new_target_frontier.is_empty() {
            break;
        }

        source_ranges.push(
            source_boxes.len() - new_source_frontier.len()..source_boxes.len(),
        );
        target_ranges.push(
            target_boxes.len() - new_target_frontier.len()..target_boxes.len(),
        );

        frontier = Frontier {
            sources: new_source_frontier,
            targets: new_target_frontier,
        };
        level += 1;
    }

    let sources_tree = Tree {
        boxes: source_boxes,
        level_ranges: source_ranges,
    };
    let targets_tree = Tree {
        boxes: target_boxes,
        level_ranges: target_ranges,
    };

    Ok(DualTree {
        sources: sources_tree,
        targets: targets_tree,
    })
}

/// Partitions box `parent`'s point slice into up to eight octant children,
/// reordering `points` in place, and appends the new boxids to `out_frontier`.
fn subdivide(
    boxes: &mut Vec<Box>,
    points: &mut PointSet,
    cube: &BoundingCube,
    parent: usize,
    child_level: u32,
    out_frontier: &mut Vec<usize>,
) {
    let (addr, npts, pidx, pidy, pidz) = {
        let b = &boxes[parent];
        (b.addr, b.npts, b.idx, b.idy, b.idz)
    };
    let center = cube.box_center(boxes[parent].level, pidx, pidy, pidz);

    // Pass 1: bucket counts per octant (prefix sums), Pass 2: scatter.
    let range = addr..addr + npts;
    let octant_of = |i: usize| -> usize {
        let p = points.coords[i];
        (usize::from(p.x >= center.x))
            | (usize::from(p.y >= center.y) << 1)
            | (usize::from(p.z >= center.z) << 2)
    };

    let mut counts = [0usize; 8];
    for i in range.clone() {
        counts[octant_of(i)] += 1;
    }

    let mut offsets = [0usize; 8];
    let mut acc = addr;
    for k in 0..8 {
        offsets[k] = acc;
        acc += counts[k];
    }

    let mut order: Vec<usize> = (0..points.len()).collect();
    let mut cursor = offsets;
    for i in range.clone() {
        let k = octant_of(i);
        order[cursor[k]] = i;
        cursor[k] += 1;
    }
    points.reorder(&order);

    let mut child_ids = [None; 8];
    let mut nchild = 0u8;
    for k in 0..8 {
        if counts[k] == 0 {
            continue;
        }
        let cid = boxes.len();
        let cix = 2 * pidx + crate::geometry::XOFF[k];
        let ciy = 2 * pidy + crate::geometry::YOFF[k];
        let ciz = 2 * pidz + crate::geometry::ZOFF[k];
        boxes.push(Box::leaf(
            child_level,
            cid,
            Some(parent),
            cix,
            ciy,
            ciz,
            counts[k],
            offsets[k],
        ));
        child_ids[k] = Some(cid);
        nchild += 1;
        out_frontier.push(cid);
    }

    boxes[parent].child = child_ids;
    boxes[parent].nchild = nchild;
}

#[cfg(test)]
mod tests {
    use super::*;
    use lin_alg::f64::Vec3;

    fn grid_points(n: i32) -> Vec<Vec3> {
        let mut v = Vec::new();
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    v.push(Vec3::new(x as f64, y as f64, z as f64));
                }
            }
        }
        v
    }

    #[test]
    fn npts_conserved_across_children() {
        let coords = grid_points(4);
        let n = coords.len();
        let mut sources = PointSet::new(coords.clone(), Some(vec![1.0; n]));
        let mut targets = PointSet::new(coords, None);
        let cube = BoundingCube::enclosing(&sources.coords, &targets.coords);
        let dual = build(&mut sources, &mut targets, &cube, 4).unwrap();

        for tree in [&dual.sources, &dual.targets] {
            for b in &tree.boxes {
                if b.nchild > 0 {
                    let sum: usize = b.children().map(|c| tree.boxes[c].npts).sum();
                    assert_eq!(sum, b.npts);
                }
            }
        }
    }

    #[test]
    fn leaves_respect_capacity_or_are_indivisible() {
        let coords = grid_points(4);
        let n = coords.len();
        let mut sources = PointSet::new(coords.clone(), Some(vec![1.0; n]));
        let mut targets = PointSet::new(coords, None);
        let cube = BoundingCube::enclosing(&sources.coords, &targets.coords);
        let dual = build(&mut sources, &mut targets, &cube, 4).unwrap();

        for b in dual.targets.boxes.iter().filter(|b| b.is_leaf()) {
            assert!(b.npts <= 4 || b.list5.iter().all(|&s| dual.sources.boxes[s].npts <= 4));
        }
    }

    #[test]
    fn root_list5_is_source_root() {
        let coords = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)];
        let mut sources = PointSet::new(coords.clone(), Some(vec![1.0, 1.0]));
        let mut targets = PointSet::new(coords, None);
        let cube = BoundingCube::enclosing(&sources.coords, &targets.coords);
        let dual = build(&mut sources, &mut targets, &cube, 10).unwrap();
        assert_eq!(dual.targets.root().list5, vec![0]);
    }

    #[test]
    fn adjacency_is_symmetric_across_levels() {
        assert!(adjacent(0, (0, 0, 0), 1, (1, 1, 1)));
        assert!(adjacent(1, (1, 1, 1), 0, (0, 0, 0)));
        assert!(!adjacent(0, (0, 0, 0), 2, (4, 4, 4)));
    }
}
