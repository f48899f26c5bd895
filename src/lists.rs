//! Interaction-list engine (spec.md §4.C).
//!
//! Runs after the dual tree is fully built (list5 is already populated by
//! [`crate::tree::build`]); this module fills in list1/list3/list4 by a
//! depth-first, parent-before-child walk of the target tree.

use crate::tree::{adjacent, Tree};

/// Populates `list1`/`list3`/`list4` on every box of `targets`, given the
/// already-built `sources` tree and `targets.list5`.
pub fn build_lists(sources: &Tree, targets: &mut Tree) {
    // Root has no parent, so its "coarse_adj" accumulator is empty.
    build_list134(sources, targets, 0, Vec::new());
}

/// `BuildList134(t)`: splits the boxes inherited via the parent's list 1
/// into this box's list 1 (still adjacent) and list 4 (no longer adjacent),
/// then either recurses into children (internal target) or hands off to
/// `BuildList13` (leaf target).
fn build_list134(sources: &Tree, targets: &mut Tree, t: usize, parent_list1: Vec<usize>) {
    let (level, grid, is_leaf) = {
        let tb = &targets.boxes[t];
        (tb.level, tb.grid(), tb.is_leaf())
    };

    let mut coarse_adj = Vec::new();
    let mut list4 = Vec::new();
    for s in parent_list1 {
        let sb = &sources.boxes[s];
        if adjacent(level, grid, sb.level, sb.grid()) {
            coarse_adj.push(s);
        } else {
            list4.push(s);
        }
    }
    targets.boxes[t].list4 = list4;

    if !is_leaf {
        // Adjacent, childless colleagues are coarse-grained neighbors of
        // this level; they already qualify for list 1 without descending.
        let list5 = targets.boxes[t].list5.clone();
        for s in list5 {
            if sources.boxes[s].is_leaf() {
                coarse_adj.push(s);
            }
        }
        targets.boxes[t].list1 = coarse_adj.clone();

        let children: Vec<usize> = targets.boxes[t].children().collect();
        for c in children {
            build_list134(sources, targets, c, coarse_adj.clone());
        }
    } else {
        build_list13(sources, targets, t, coarse_adj);
    }
}

/// `BuildList13(t, coarse_adj)`: descends every colleague in `t.list5`,
/// routing non-adjacent descendants to list 3 and adjacent leaves to
/// list 1, prefixed by the coarser-level entries already found.
fn build_list13(sources: &Tree, targets: &mut Tree, t: usize, coarse_adj: Vec<usize>) {
    let (level, grid) = {
        let tb = &targets.boxes[t];
        (tb.level, tb.grid())
    };

    let mut list1 = coarse_adj;
    let mut list3 = Vec::new();

    let colleagues: Vec<usize> = targets.boxes[t].list5.clone();
    for s in colleagues {
        descend(sources, s, level, grid, &mut list1, &mut list3);
    }

    targets.boxes[t].list1 = list1;
    targets.boxes[t].list3 = list3;
}

fn descend(
    sources: &Tree,
    s: usize,
    level: u32,
    grid: (i32, i32, i32),
    list1: &mut Vec<usize>,
    list3: &mut Vec<usize>,
) {
    let sb = &sources.boxes[s];
    if adjacent(level, grid, sb.level, sb.grid()) {
        if sb.is_leaf() {
            list1.push(s);
        } else {
            for c in sb.children().collect::<Vec<_>>() {
                descend(sources, c, level, grid, list1, list3);
            }
        }
    } else {
        list3.push(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingCube;
    use crate::points::PointSet;
    use crate::tree::build;
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
    fn list1_contains_only_source_leaves() {
        let coords = grid_points(5);
        let n = coords.len();
        let mut sources = PointSet::new(coords.clone(), Some(vec![1.0; n]));
        let mut targets = PointSet::new(coords, None);
        let cube = BoundingCube::enclosing(&sources.coords, &targets.coords);
        let mut dual = build(&mut sources, &mut targets, &cube, 3).unwrap();
        build_lists(&dual.sources, &mut dual.targets);

        for t in &dual.targets.boxes {
            for &s in &t.list1 {
                assert!(dual.sources.boxes[s].is_leaf());
            }
        }
    }

    #[test]
    fn list3_and_list4_are_never_adjacent() {
        let coords = grid_points(5);
        let n = coords.len();
        let mut sources = PointSet::new(coords.clone(), Some(vec![1.0; n]));
        let mut targets = PointSet::new(coords, None);
        let cube = BoundingCube::enclosing(&sources.coords, &targets.coords);
        let mut dual = build(&mut sources, &mut targets, &cube, 3).unwrap();
        build_lists(&dual.sources, &mut dual.targets);

        for t in &dual.targets.boxes {
            for &s in t.list3.iter().chain(t.list4.iter()) {
                let sb = &dual.sources.boxes[s];
                assert!(!adjacent(t.level, t.grid(), sb.level, sb.grid()));
            }
        }
    }

    #[test]
    fn single_box_has_no_far_lists() {
        let coords = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.1, 0.1, 0.1)];
        let mut sources = PointSet::new(coords.clone(), Some(vec![1.0, 1.0]));
        let mut targets = PointSet::new(coords, None);
        let cube = BoundingCube::enclosing(&sources.coords, &targets.coords);
        let mut dual = build(&mut sources, &mut targets, &cube, 10).unwrap();
        build_lists(&dual.sources, &mut dual.targets);

        let root = dual.targets.root();
        assert!(root.list3.is_empty());
        assert!(root.list4.is_empty());
        assert_eq!(root.list1, vec![0]);
    }
}
