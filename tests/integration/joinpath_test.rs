use std::rc::Rc;

use anyhow::{Result, anyhow};

use bayun_joinpath::common::RelIndex;
use bayun_joinpath::planner::expr::Expression;
use bayun_joinpath::planner::joininfo::{PlaceHolderInfo, SpecialJoinInfo};
use bayun_joinpath::planner::path::ParamPathInfo;
use bayun_joinpath::planner::pathkeys::PathKey;
use bayun_joinpath::planner::restrictinfo::RestrictInfo;
use bayun_joinpath::{
    JoinInputs, JoinType, Path, PathKind, PlannerConfig, PlannerError, PlannerInfo, Relids, ScanMethod,
    add_paths_to_joinrel, make_join_rel,
};

#[path = "../common/mod.rs"]
mod common;
use common::{eq_clause, index_scan, is_kind, join_type_of, keep_all_planner, paths_of, planner, with_seq_scan};

struct Star {
    root: PlannerInfo,
    fact: RelIndex,
    dim1: RelIndex,
}

/// fact(1) with an index on (c1, c2) matching dim1(2).c1 and dim2(3).c1
fn star_scenario(mut root: PlannerInfo) -> Result<Star> {
    let fact = root.add_base_rel(1, "fact", 3, 1_000_000.0);
    let dim1 = root.add_base_rel(2, "dim1", 2, 100.0);
    let dim2 = root.add_base_rel(3, "dim2", 2, 100.0);
    let by_dim1 = root.add_join_clause(eq_clause((1, 1), (2, 1)));
    let by_dim2 = root.add_join_clause(eq_clause((1, 2), (3, 1)));

    for rel in [dim1, dim2] {
        with_seq_scan(&mut root, rel)?;
    }
    root.add_scan_path(fact, ScanMethod::Seq, Vec::new(), None)?;
    let param = ParamPathInfo {
        req_outer: Relids::from([2, 3]),
        rows: 10.0,
        clauses: vec![by_dim1, by_dim2],
    };
    root.add_scan_path(fact, index_scan("fact_dims_idx"), Vec::new(), Some(param))?;
    root.set_cheapest(fact)?;
    Ok(Star { root, fact, dim1 })
}

fn join(root: &mut PlannerInfo, rel1: RelIndex, rel2: RelIndex) -> Result<RelIndex> {
    make_join_rel(root, rel1, rel2)?.ok_or_else(|| anyhow!("relations should be joinable"))
}

fn nestloops_requiring(paths: &[Rc<Path>], required: &Relids) -> usize {
    paths
        .iter()
        .filter(|p| is_kind(p, "Nested Loop") && p.required_outer() == *required)
        .count()
}

#[test]
fn test_star_schema_parameterization() -> Result<()> {
    let mut star = star_scenario(planner())?;
    let joinrel = join(&mut star.root, star.dim1, star.fact)?;
    let paths = paths_of(&star.root, joinrel)?;

    // dim1 supplies half of the index parameters; dim2 is still needed
    assert!(nestloops_requiring(&paths, &Relids::from([3])) >= 1);
    let path = paths
        .iter()
        .find(|p| p.required_outer() == Relids::from([3]))
        .ok_or_else(|| anyhow!("no path parameterized by dim2"))?;
    let join = path.join_info().ok_or_else(|| anyhow!("not a join"))?;
    assert_eq!(join.outer.parent_relids, Relids::from([2]));
    assert!(matches!(join.inner.kind, PathKind::Scan(ScanMethod::Index { .. })));
    // the index enforces the join clause, so the nested loop does not recheck it
    assert!(join.joinrestrictinfo.is_empty());
    Ok(())
}

#[test]
fn test_hazardous_placeholder_blocks_star_join() -> Result<()> {
    let mut star = star_scenario(keep_all_planner(PlannerConfig::default()))?;
    star.root.placeholder_list.push(PlaceHolderInfo::new(1, Relids::from([2, 3])));
    let joinrel = join(&mut star.root, star.dim1, star.fact)?;
    let paths = paths_of(&star.root, joinrel)?;

    assert!(!paths.is_empty());
    assert!(paths.iter().all(|p| p.required_outer().is_empty()));
    Ok(())
}

#[test]
fn test_no_self_parameterized_join_paths() -> Result<()> {
    let mut star = star_scenario(keep_all_planner(PlannerConfig::default()))?;
    let joinrel = join(&mut star.root, star.dim1, star.fact)?;
    let rel = star.root.rel(joinrel)?;

    assert!(!rel.pathlist.is_empty());
    for path in &rel.pathlist {
        assert!(
            !path.required_outer().overlaps(&rel.relids),
            "path requires its own relations:\n{}",
            path
        );
    }
    // the fact index path needs dim1 itself, so only a nested loop over
    // dim1 can use it
    for path in rel.pathlist.iter().filter(|p| !p.required_outer().is_empty()) {
        assert!(is_kind(path, "Nested Loop"));
    }
    Ok(())
}

#[test]
fn test_clauseless_full_join_uses_merge_only() -> Result<()> {
    let mut root = keep_all_planner(PlannerConfig::default());
    let a = root.add_base_rel(1, "a", 2, 100.0);
    let b = root.add_base_rel(2, "b", 2, 100.0);
    with_seq_scan(&mut root, a)?;
    with_seq_scan(&mut root, b)?;
    root.join_info_list
        .push(SpecialJoinInfo::new(JoinType::Full, Relids::from([1]), Relids::from([2])));

    let joinrel = join(&mut root, a, b)?;
    let paths = paths_of(&root, joinrel)?;

    // one per direction
    assert_eq!(paths.len(), 2);
    for path in &paths {
        let PathKind::MergeJoin { join, mergeclauses, .. } = &path.kind else {
            panic!("unexpected path\n{}", path);
        };
        assert_eq!(join.jointype, JoinType::Full);
        assert!(mergeclauses.is_empty());
    }
    Ok(())
}

#[test]
fn test_full_join_with_hash_disabled_still_hashes() -> Result<()> {
    let config = PlannerConfig {
        enable_hashjoin: false,
        enable_mergejoin: false,
        ..PlannerConfig::default()
    };
    let mut root = keep_all_planner(config);
    let a = root.add_base_rel(1, "a", 2, 100.0);
    let b = root.add_base_rel(2, "b", 2, 100.0);
    with_seq_scan(&mut root, a)?;
    with_seq_scan(&mut root, b)?;
    root.add_outer_join_clause(eq_clause((1, 1), (2, 1)));
    root.join_info_list
        .push(SpecialJoinInfo::new(JoinType::Full, Relids::from([1]), Relids::from([2])));

    let joinrel = join(&mut root, a, b)?;
    let paths = paths_of(&root, joinrel)?;
    assert!(paths.iter().any(|p| is_kind(p, "Hash Join")));
    assert!(paths.iter().any(|p| is_kind(p, "Merge Join")));
    assert!(!paths.iter().any(|p| is_kind(p, "Nested Loop")));
    assert!(paths.iter().all(|p| join_type_of(p) == Some(JoinType::Full)));
    Ok(())
}

#[test]
fn test_presorted_inner_on_key_prefix() -> Result<()> {
    let mut root = keep_all_planner(PlannerConfig::default());
    let a = root.add_base_rel(1, "a", 2, 10_000.0);
    let b = root.add_base_rel(2, "b", 2, 10_000.0);
    root.add_join_clause(eq_clause((1, 1), (2, 1)));
    root.add_join_clause(eq_clause((1, 2), (2, 2)));

    let outer_keys = vec![
        root.pathkey_for(&Expression::column(1, 1)),
        root.pathkey_for(&Expression::column(1, 2)),
    ];
    let inner_key = root.pathkey_for(&Expression::column(2, 1));
    root.add_scan_path(a, index_scan("a_c1_c2_idx"), outer_keys, None)?;
    root.set_cheapest(a)?;
    root.add_scan_path(b, ScanMethod::Seq, Vec::new(), None)?;
    root.add_scan_path(b, index_scan("b_c1_idx"), vec![inner_key], None)?;
    root.set_cheapest(b)?;

    let joinrel = join(&mut root, a, b)?;
    let paths = paths_of(&root, joinrel)?;

    let prefix_merge = paths.iter().find(|p| match &p.kind {
        PathKind::MergeJoin {
            join,
            mergeclauses,
            innersortkeys,
            ..
        } => {
            mergeclauses.len() == 1
                && innersortkeys.is_empty()
                && matches!(join.inner.kind, PathKind::Scan(ScanMethod::Index { .. }))
                && join.outer.parent_relids == Relids::from([1])
        }
        _ => false,
    });
    let prefix_merge = prefix_merge.ok_or_else(|| anyhow!("no merge join on the presorted key prefix"))?;
    let join = prefix_merge.join_info().ok_or_else(|| anyhow!("not a join"))?;
    // the clause left out of the merge keys is still checked
    assert_eq!(join.joinrestrictinfo.len(), 2);

    let full_merge = paths.iter().any(|p| match &p.kind {
        PathKind::MergeJoin { mergeclauses, .. } => mergeclauses.len() == 2,
        _ => false,
    });
    assert!(full_merge);
    Ok(())
}

#[test]
fn test_sorted_merge_tries_each_leading_key() -> Result<()> {
    let mut root = keep_all_planner(PlannerConfig::default());
    let a = root.add_base_rel(1, "a", 2, 10_000.0);
    let b = root.add_base_rel(2, "b", 2, 10_000.0);
    with_seq_scan(&mut root, a)?;
    with_seq_scan(&mut root, b)?;
    root.add_join_clause(eq_clause((1, 1), (2, 1)));
    root.add_join_clause(eq_clause((1, 2), (2, 2)));

    let joinrel = join(&mut root, a, b)?;
    let paths = paths_of(&root, joinrel)?;

    let mut orderings: Vec<Vec<PathKey>> = Vec::new();
    for path in &paths {
        if let PathKind::MergeJoin {
            join,
            mergeclauses,
            outersortkeys,
            ..
        } = &path.kind
        {
            if join.outer.parent_relids == Relids::from([1]) {
                assert_eq!(mergeclauses.len(), 2);
                assert_eq!(outersortkeys.len(), 2);
                if !orderings.contains(outersortkeys) {
                    orderings.push(outersortkeys.clone());
                }
            }
        }
    }
    assert_eq!(orderings.len(), 2);
    assert_ne!(orderings[0][0], orderings[1][0]);
    Ok(())
}

/// a JOIN b on one clause, with the clause stripped down by `adjust`
fn single_clause_join(adjust: fn(RestrictInfo) -> RestrictInfo) -> Result<Vec<Rc<Path>>> {
    let mut root = keep_all_planner(PlannerConfig::default());
    let a = root.add_base_rel(1, "a", 2, 1000.0);
    let b = root.add_base_rel(2, "b", 2, 1000.0);
    with_seq_scan(&mut root, a)?;
    with_seq_scan(&mut root, b)?;
    root.add_join_clause(adjust(eq_clause((1, 1), (2, 1))));
    let joinrel = join(&mut root, a, b)?;
    paths_of(&root, joinrel)
}

#[test]
fn test_hash_only_clause_never_merges() -> Result<()> {
    let paths = single_clause_join(RestrictInfo::without_merge)?;
    assert!(paths.iter().any(|p| is_kind(p, "Hash Join")));
    assert!(paths.iter().any(|p| is_kind(p, "Nested Loop")));
    assert!(!paths.iter().any(|p| is_kind(p, "Merge Join")));
    Ok(())
}

#[test]
fn test_merge_only_clause_never_hashes() -> Result<()> {
    let paths = single_clause_join(RestrictInfo::without_hash)?;
    assert!(paths.iter().any(|p| is_kind(p, "Merge Join")));
    assert!(!paths.iter().any(|p| is_kind(p, "Hash Join")));
    Ok(())
}

#[test]
fn test_disabled_strategies() -> Result<()> {
    let config = PlannerConfig {
        enable_mergejoin: false,
        enable_hashjoin: false,
        ..PlannerConfig::default()
    };
    let mut root = keep_all_planner(config);
    let a = root.add_base_rel(1, "a", 2, 1000.0);
    let b = root.add_base_rel(2, "b", 2, 1000.0);
    with_seq_scan(&mut root, a)?;
    with_seq_scan(&mut root, b)?;
    root.add_join_clause(eq_clause((1, 1), (2, 1)));

    let joinrel = join(&mut root, a, b)?;
    let paths = paths_of(&root, joinrel)?;
    assert!(!paths.is_empty());
    assert!(paths.iter().all(|p| is_kind(p, "Nested Loop")));
    // the cheapest inner is materialized for rescans
    assert!(paths.iter().any(|p| {
        p.join_info()
            .is_some_and(|join| matches!(join.inner.kind, PathKind::Material { .. }))
    }));
    Ok(())
}

#[test]
fn test_make_join_rel_idempotent() -> Result<()> {
    let mut root = planner();
    let a = root.add_base_rel(1, "a", 2, 1000.0);
    let b = root.add_base_rel(2, "b", 2, 500.0);
    with_seq_scan(&mut root, a)?;
    with_seq_scan(&mut root, b)?;
    root.add_join_clause(eq_clause((1, 1), (2, 1)));

    let joinrel = join(&mut root, a, b)?;
    let first = paths_of(&root, joinrel)?;
    assert_eq!(join(&mut root, a, b)?, joinrel);
    let second = paths_of(&root, joinrel)?;

    assert_eq!(first.len(), second.len());
    for (before, after) in first.iter().zip(&second) {
        assert!(Rc::ptr_eq(before, after));
    }
    Ok(())
}

#[test]
fn test_mismatched_join_type_rejected() -> Result<()> {
    let mut root = planner();
    let a = root.add_base_rel(1, "a", 2, 100.0);
    let b = root.add_base_rel(2, "b", 2, 100.0);
    with_seq_scan(&mut root, a)?;
    with_seq_scan(&mut root, b)?;
    let joinrel = join(&mut root, a, b)?;

    let inputs = JoinInputs {
        joinrel,
        outerrel: a,
        innerrel: b,
    };
    let sjinfo = SpecialJoinInfo::inner(Relids::from([1]), Relids::from([2]));
    let result = add_paths_to_joinrel(&mut root, inputs, JoinType::Full, &sjinfo, &[]);
    assert!(matches!(result, Err(PlannerError::UnrecognizedJoinType(JoinType::Full))));
    Ok(())
}

#[test]
fn test_unique_inner_without_semi_exprs_fails() -> Result<()> {
    let mut root = planner();
    let a = root.add_base_rel(1, "a", 2, 100.0);
    let b = root.add_base_rel(2, "b", 2, 100.0);
    with_seq_scan(&mut root, a)?;
    with_seq_scan(&mut root, b)?;
    let joinrel = join(&mut root, a, b)?;

    let inputs = JoinInputs {
        joinrel,
        outerrel: a,
        innerrel: b,
    };
    let sjinfo = SpecialJoinInfo::new(JoinType::Semi, Relids::from([1]), Relids::from([2]));
    let restrictlist = root.build_joinrel_restrictlist(&Relids::from([1]), &Relids::from([2]));
    let result = add_paths_to_joinrel(&mut root, inputs, JoinType::UniqueInner, &sjinfo, &restrictlist);
    assert!(matches!(
        result,
        Err(PlannerError::MissingSpecialJoinInfo(JoinType::Semi))
    ));
    Ok(())
}
