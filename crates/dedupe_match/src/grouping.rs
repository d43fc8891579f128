//! crates/dedupe_match/src/grouping.rs
//! Connected components over admitted candidate edges: Union-Find with
//! path compression and union by size, edge-gating, and the canopy bound.
//!
//! Suffix-mismatch pairs never unify; they ride along as annotations and
//! can only force Verify downstream. Edges are processed strongest-first
//! in a total order, so replays admit the same edges every time.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use dedupe_core::config::{GroupingCfg, ResolvedSimilarity};
use dedupe_core::entities::{EdgeReason, NameNorm};
use dedupe_core::score::ScoreCenti;

/// A scored, kept pair in record-index space (`a < b`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoredEdge {
    pub a: u32,
    pub b: u32,
    pub score: ScoreCenti,
    pub suffix_match: bool,
}

/// An edge that made it into a component, with its admission reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmittedEdge {
    pub a: u32,
    pub b: u32,
    pub score: ScoreCenti,
    pub reason: EdgeReason,
}

/// One connected component (singletons included).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    /// Sorted ascending; index order equals `account_id` order.
    pub members: Vec<u32>,
    /// Minimum member index (= minimum account id).
    pub representative: u32,
    /// Admitted edges with both ends in this component.
    pub edges: Vec<AdmittedEdge>,
    pub max_score: ScoreCenti,
    pub min_score: ScoreCenti,
    pub has_suffix_mismatch: bool,
}

/// Grouping result for the whole corpus.
#[derive(Clone, Debug, Default)]
pub struct GroupingOutcome {
    /// Ordered by smallest member index.
    pub components: Vec<Component>,
    /// Per record: participates in at least one suffix-mismatch annotation.
    pub suffix_flagged: Vec<bool>,
    pub gate_rejections: u64,
    pub canopy_rejections: u64,
}

// ------------------------------- Union-Find -------------------------------

/// Dense-index Union-Find with path compression and union by size. The
/// per-root representative (minimum member index) feeds edge-gating and
/// the canopy rule.
pub struct UnionFind {
    parent: Vec<u32>,
    size: Vec<u32>,
    rep: Vec<u32>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n as u32).collect(),
            size: vec![1; n],
            rep: (0..n as u32).collect(),
        }
    }

    pub fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Path compression.
        let mut cur = x;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    pub fn size_of(&mut self, x: u32) -> u32 {
        let r = self.find(x);
        self.size[r as usize]
    }

    /// Representative (minimum member index) of x's component.
    pub fn rep_of(&mut self, x: u32) -> u32 {
        let r = self.find(x);
        self.rep[r as usize]
    }

    /// Union by size; keeps the minimum-index representative.
    pub fn union(&mut self, x: u32, y: u32) -> bool {
        let (mut rx, mut ry) = (self.find(x), self.find(y));
        if rx == ry {
            return false;
        }
        if self.size[rx as usize] < self.size[ry as usize] {
            core::mem::swap(&mut rx, &mut ry);
        }
        self.parent[ry as usize] = rx;
        self.size[rx as usize] += self.size[ry as usize];
        self.rep[rx as usize] = self.rep[rx as usize].min(self.rep[ry as usize]);
        true
    }
}

// ------------------------------ Edge gating ------------------------------

fn share_nonstop_token(a: &NameNorm, b: &NameNorm, stops: &BTreeSet<&str>) -> bool {
    let ta: BTreeSet<&str> = a.core_tokens().filter(|t| !stops.contains(*t)).collect();
    b.core_tokens().filter(|t| !stops.contains(*t)).any(|t| ta.contains(t))
}

/// Build components from kept edges.
///
/// `norms` is indexed by record index; edges use the same space. Stop
/// tokens mirror the blocking hygiene set.
pub fn group_components(
    norms: &[NameNorm],
    edges: &[ScoredEdge],
    sim: &ResolvedSimilarity,
    cfg: &GroupingCfg,
    stop_tokens: &[String],
) -> GroupingOutcome {
    let n = norms.len();
    let stops: BTreeSet<&str> = stop_tokens.iter().map(String::as_str).collect();
    let mut uf = UnionFind::new(n);

    let mut ordered: Vec<&ScoredEdge> = edges.iter().collect();
    ordered.sort_by(|x, y| {
        y.score.cmp(&x.score).then_with(|| x.a.cmp(&y.a)).then_with(|| x.b.cmp(&y.b))
    });

    let mut admitted: Vec<AdmittedEdge> = Vec::new();
    let mut annotations: Vec<(u32, u32)> = Vec::new();
    let mut suffix_flagged = vec![false; n];
    let mut gate_rejections: u64 = 0;
    let mut canopy_rejections: u64 = 0;

    for edge in ordered {
        // Suffix mismatch forbids admission outright.
        if !edge.suffix_match {
            annotations.push((edge.a, edge.b));
            suffix_flagged[edge.a as usize] = true;
            suffix_flagged[edge.b as usize] = true;
            continue;
        }
        if edge.score < sim.medium {
            continue;
        }

        let ra = uf.find(edge.a);
        let rb = uf.find(edge.b);
        if ra == rb {
            continue; // already connected; spanning edges only
        }

        // Edge gate: high always passes; medium needs a shared non-stop
        // token with the opposite component's representative.
        let reason = if edge.score >= sim.high {
            EdgeReason::High
        } else if !cfg.edge_gating_enabled {
            EdgeReason::MediumSharedToken
        } else {
            let rep_a = uf.rep_of(edge.a) as usize;
            let rep_b = uf.rep_of(edge.b) as usize;
            let shared = share_nonstop_token(&norms[edge.a as usize], &norms[rep_b], &stops)
                || share_nonstop_token(&norms[edge.b as usize], &norms[rep_a], &stops);
            if shared {
                EdgeReason::MediumSharedToken
            } else {
                gate_rejections += 1;
                continue;
            }
        };

        // Canopy bound: merges over the size limit need a high edge into
        // the larger component's representative.
        if cfg.canopy_enabled {
            let merged = uf.size_of(edge.a) + uf.size_of(edge.b);
            if merged > cfg.max_group_size {
                let (big_end, big_rep) = if uf.size_of(edge.a) >= uf.size_of(edge.b) {
                    (edge.a, uf.rep_of(edge.a))
                } else {
                    (edge.b, uf.rep_of(edge.b))
                };
                let over_ok = edge.score >= sim.high && big_end == big_rep;
                if !over_ok {
                    canopy_rejections += 1;
                    continue;
                }
            }
        }

        uf.union(edge.a, edge.b);
        admitted.push(AdmittedEdge { a: edge.a, b: edge.b, score: edge.score, reason });
    }

    // Materialize components (every record appears; singletons included).
    let mut by_root: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for i in 0..n as u32 {
        by_root.entry(uf.find(i)).or_default().push(i);
    }

    let mut edges_by_root: BTreeMap<u32, Vec<AdmittedEdge>> = BTreeMap::new();
    for e in &admitted {
        edges_by_root.entry(uf.find(e.a)).or_default().push(*e);
    }
    let mut mismatch_roots: BTreeSet<u32> = BTreeSet::new();
    for (a, b) in &annotations {
        if uf.find(*a) == uf.find(*b) {
            mismatch_roots.insert(uf.find(*a));
        }
    }

    let mut components: Vec<Component> = Vec::new();
    for (root, mut members) in by_root {
        members.sort_unstable();
        let comp_edges = edges_by_root.remove(&root).unwrap_or_default();
        let (max_score, min_score) = comp_edges
            .iter()
            .fold((0, 0), |(mx, mn), e| {
                if mn == 0 {
                    (e.score, e.score)
                } else {
                    (mx.max(e.score), mn.min(e.score))
                }
            });
        components.push(Component {
            representative: members[0],
            has_suffix_mismatch: mismatch_roots.contains(&root),
            members,
            edges: comp_edges,
            max_score,
            min_score,
        });
    }
    components.sort_by_key(|c| c.members[0]);

    GroupingOutcome { components, suffix_flagged, gate_rejections, canopy_rejections }
}

// ------------------------- Paths to the primary -------------------------

/// Per-member `(weakest_edge_to_primary, score_to_primary)` over the
/// admitted-edge tree, via BFS from the primary with sorted adjacency.
/// `score_to_primary` prefers the direct edge when one exists, else the
/// weakest edge on the discovered path.
pub fn edge_metrics_from_primary(
    component: &Component,
    primary: u32,
) -> BTreeMap<u32, (ScoreCenti, ScoreCenti)> {
    let mut adj: BTreeMap<u32, Vec<(u32, ScoreCenti)>> = BTreeMap::new();
    let mut direct: BTreeMap<u32, ScoreCenti> = BTreeMap::new();
    for e in &component.edges {
        adj.entry(e.a).or_default().push((e.b, e.score));
        adj.entry(e.b).or_default().push((e.a, e.score));
        if e.a == primary {
            direct.insert(e.b, e.score);
        } else if e.b == primary {
            direct.insert(e.a, e.score);
        }
    }
    for nbrs in adj.values_mut() {
        nbrs.sort_unstable();
    }

    let mut out: BTreeMap<u32, (ScoreCenti, ScoreCenti)> = BTreeMap::new();
    let mut weakest: BTreeMap<u32, ScoreCenti> = BTreeMap::new();
    let mut queue: VecDeque<u32> = VecDeque::new();
    weakest.insert(primary, ScoreCenti::MAX);
    queue.push_back(primary);

    while let Some(cur) = queue.pop_front() {
        let cur_weak = weakest[&cur];
        if let Some(nbrs) = adj.get(&cur) {
            for (nb, score) in nbrs {
                if !weakest.contains_key(nb) {
                    let w = cur_weak.min(*score);
                    weakest.insert(*nb, w);
                    out.insert(*nb, (w, *direct.get(nb).unwrap_or(&w)));
                    queue.push_back(*nb);
                }
            }
        }
    }
    out
}

// === Tests ===
