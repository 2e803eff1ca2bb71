use std::rc::Rc;

use anyhow::{Result, anyhow};

use bayun_joinpath::common::RelIndex;
use bayun_joinpath::planner::expr::{ColumnRef, Expression, Value};
use bayun_joinpath::planner::joininfo::SpecialJoinInfo;
use bayun_joinpath::planner::path::ParamPathInfo;
use bayun_joinpath::{JoinType, Path, PathKind, PlannerConfig, PlannerInfo, Relids, ScanMethod, make_join_rel};

#[path = "../common/mod.rs"]
mod common;
use common::{
    PARTITION_MEMBERS, PartitionOptions, PartitionScenario, Row, TestData, canonical, execute, index_scan,
    keep_all_planner, modulo_check, partition_scenario, planner,
};

fn join_part_and_big(scenario: &mut PartitionScenario) -> Result<RelIndex> {
    make_join_rel(&mut scenario.root, scenario.parent, scenario.inner)?
        .ok_or_else(|| anyhow!("part and big should be joinable"))
}

fn append_paths(root: &PlannerInfo, joinrel: RelIndex) -> Result<Vec<Rc<Path>>> {
    Ok(root
        .rel(joinrel)?
        .pathlist
        .iter()
        .filter(|p| p.is_append())
        .cloned()
        .collect())
}

/// part JOIN big ON part.c1 = big.c1, computed directly from the data
fn expected_rows(data: &TestData) -> Vec<Row> {
    let mut rows = Vec::new();
    for member in PARTITION_MEMBERS {
        for left in data.rows(member) {
            for right in data.rows(2) {
                if left[0] != right[0] {
                    continue;
                }
                let row: Row = [(1, 1, left[0]), (1, 2, left[1]), (2, 1, right[0]), (2, 2, right[1])]
                    .into_iter()
                    .map(|(relid, attno, v)| (ColumnRef { relid, attno }, Value::Integer(v)))
                    .collect();
                rows.push(row);
            }
        }
    }
    rows
}

fn is_filtered_scan(path: &Path) -> bool {
    matches!(path.kind, PathKind::Scan(_))
        && path
            .param_info
            .as_ref()
            .is_some_and(|ppi| ppi.req_outer.is_empty() && !ppi.clauses.is_empty())
}

#[test]
fn test_append_pullup_preserves_join_result() -> Result<()> {
    let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), PartitionOptions::default())?;
    let joinrel = join_part_and_big(&mut scenario)?;
    let root = &scenario.root;

    let appends = append_paths(root, joinrel)?;
    assert_eq!(appends.len(), 1, "expected exactly one rewritten Append path");
    let PathKind::Append { subpaths } = &appends[0].kind else {
        unreachable!()
    };
    assert_eq!(subpaths.len(), PARTITION_MEMBERS.len());
    for (subpath, member) in subpaths.iter().zip(PARTITION_MEMBERS) {
        assert_eq!(subpath.parent_relids, Relids::from([2, member]));
    }

    let expected = canonical(expected_rows(&scenario.data));
    assert!(!expected.is_empty());
    let actual = canonical(execute(root, &scenario.data, &appends[0], &Row::new())?);
    assert_eq!(actual, expected);
    Ok(())
}

#[test]
fn test_every_join_path_returns_same_rows() -> Result<()> {
    for seed in [1, 7, 99] {
        let options = PartitionOptions {
            seed,
            ..PartitionOptions::default()
        };
        let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), options)?;
        let joinrel = join_part_and_big(&mut scenario)?;
        let expected = canonical(expected_rows(&scenario.data));

        let paths = scenario.root.rel(joinrel)?.pathlist.clone();
        assert!(paths.len() > 1);
        for path in &paths {
            let actual = canonical(execute(&scenario.root, &scenario.data, path, &Row::new())?);
            assert_eq!(actual, expected, "seed {}: wrong rows from\n{}", seed, path);
        }
    }
    Ok(())
}

#[test]
fn test_branch_joins_use_filtered_inner_and_restore_it() -> Result<()> {
    let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), PartitionOptions::default())?;
    let inner_paths_before = scenario.root.rel(scenario.inner)?.pathlist.clone();
    join_part_and_big(&mut scenario)?;
    let root = &scenario.root;

    for member in PARTITION_MEMBERS {
        let child_join = root
            .find_join_rel(&Relids::from([member, 2]))
            .ok_or_else(|| anyhow!("missing branch join for member {}", member))?;
        let uses_filtered = root.rel(child_join)?.pathlist.iter().any(|path| {
            path.join_info()
                .is_some_and(|join| is_filtered_scan(&join.inner) || is_filtered_scan(&join.outer))
        });
        assert!(uses_filtered, "branch join for member {} never saw the filtered scan", member);
    }

    // the temporary path is gone and the original cheapest paths are back
    let innerrel = root.rel(scenario.inner)?;
    assert_eq!(innerrel.pathlist.len(), inner_paths_before.len());
    for (after, before) in innerrel.pathlist.iter().zip(&inner_paths_before) {
        assert!(Rc::ptr_eq(after, before));
    }
    assert!(innerrel.pathlist.iter().all(|p| p.param_info.is_none()));
    let cheapest = innerrel.cheapest_total_path.as_ref().ok_or_else(|| anyhow!("no cheapest path"))?;
    assert!(Rc::ptr_eq(cheapest, &inner_paths_before[0]));
    assert!(!innerrel.cheapest_parameterized_paths.contains_key(&Some(Relids::empty())));
    Ok(())
}

#[test]
fn test_filtered_index_scan_keeps_ordering() -> Result<()> {
    let options = PartitionOptions {
        inner_method: index_scan("big_c1_idx"),
        ..PartitionOptions::default()
    };
    let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), options)?;
    let joinrel = join_part_and_big(&mut scenario)?;
    let root = &scenario.root;

    assert_eq!(append_paths(root, joinrel)?.len(), 1);
    let child_join = root
        .find_join_rel(&Relids::from([11, 2]))
        .ok_or_else(|| anyhow!("missing branch join"))?;
    let filtered_inner = root
        .rel(child_join)?
        .pathlist
        .iter()
        .filter_map(|path| path.join_info())
        .map(|join| Rc::clone(&join.inner))
        .find(|inner| is_filtered_scan(inner))
        .ok_or_else(|| anyhow!("no filtered inner scan"))?;
    assert!(matches!(filtered_inner.kind, PathKind::Scan(ScanMethod::Index { .. })));
    assert_eq!(filtered_inner.pathkeys.len(), 1);

    let expected = canonical(expected_rows(&scenario.data));
    let append = &append_paths(root, joinrel)?[0];
    assert_eq!(canonical(execute(root, &scenario.data, append, &Row::new())?), expected);
    Ok(())
}

#[test]
fn test_constraint_on_non_join_column_aborts() -> Result<()> {
    let options = PartitionOptions {
        checks: Some(
            PARTITION_MEMBERS
                .iter()
                .enumerate()
                .map(|(n, &member)| modulo_check(member, 2, 3, n as i64))
                .collect(),
        ),
        ..PartitionOptions::default()
    };
    let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), options)?;
    let joinrel = join_part_and_big(&mut scenario)?;

    assert!(append_paths(&scenario.root, joinrel)?.is_empty());
    assert!(scenario.root.rel(joinrel)?.has_paths());
    // gave up before building any branch join
    assert!(scenario.root.find_join_rel(&Relids::from([11, 2])).is_none());
    Ok(())
}

#[test]
fn test_no_join_clause_no_rewrite() -> Result<()> {
    let options = PartitionOptions {
        join_on_key: false,
        ..PartitionOptions::default()
    };
    let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), options)?;
    let joinrel = join_part_and_big(&mut scenario)?;

    assert!(append_paths(&scenario.root, joinrel)?.is_empty());
    assert!(scenario.root.find_join_rel(&Relids::from([11, 2])).is_none());
    Ok(())
}

#[test]
fn test_parameterized_inner_no_rewrite() -> Result<()> {
    let mut root = keep_all_planner(PlannerConfig::default());
    let other = root.add_base_rel(3, "other", 2, 10.0);
    common::with_seq_scan(&mut root, other)?;
    let mut scenario = partition_scenario(root, PartitionOptions::default())?;

    let by_other = scenario.root.add_join_clause(common::eq_clause((2, 2), (3, 1)));
    let param = ParamPathInfo {
        req_outer: Relids::from([3]),
        rows: 5.0,
        clauses: vec![by_other],
    };
    scenario
        .root
        .add_scan_path(scenario.inner, index_scan("big_c2_idx"), Vec::new(), Some(param))?;
    scenario.root.set_cheapest(scenario.inner)?;

    let joinrel = join_part_and_big(&mut scenario)?;
    assert!(append_paths(&scenario.root, joinrel)?.is_empty());
    Ok(())
}

#[test]
fn test_function_scan_inner_no_rewrite() -> Result<()> {
    let options = PartitionOptions {
        inner_method: ScanMethod::Function {
            name: "generate_series".to_string(),
        },
        ..PartitionOptions::default()
    };
    let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), options)?;
    let joinrel = join_part_and_big(&mut scenario)?;
    assert!(append_paths(&scenario.root, joinrel)?.is_empty());
    Ok(())
}

#[test]
fn test_disabled_pullup() -> Result<()> {
    let config = PlannerConfig {
        enable_append_pullup: false,
        ..PlannerConfig::default()
    };
    let mut scenario = partition_scenario(keep_all_planner(config), PartitionOptions::default())?;
    let joinrel = join_part_and_big(&mut scenario)?;
    assert!(append_paths(&scenario.root, joinrel)?.is_empty());
    assert!(scenario.root.find_join_rel(&Relids::from([11, 2])).is_none());
    Ok(())
}

#[test]
fn test_default_admission_paths_agree() -> Result<()> {
    let options = PartitionOptions {
        inner_method: index_scan("big_c1_idx"),
        ..PartitionOptions::default()
    };
    let mut scenario = partition_scenario(planner(), options)?;
    let joinrel = join_part_and_big(&mut scenario)?;
    let expected = canonical(expected_rows(&scenario.data));

    let paths = scenario.root.rel(joinrel)?.pathlist.clone();
    assert!(!paths.is_empty());
    for path in &paths {
        assert_eq!(canonical(execute(&scenario.root, &scenario.data, path, &Row::new())?), expected);
    }
    Ok(())
}

#[test]
fn test_column_needs_reach_members() -> Result<()> {
    let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), PartitionOptions::default())?;
    {
        let parent = scenario.root.rel_mut(scenario.parent)?;
        // c1 is only needed by the join itself, c2 also by relation 5 above it
        parent.attr_needed.insert(1, Relids::from([2]));
        parent.attr_needed.insert(2, Relids::from([2, 5]));
    }
    let joinrel = join_part_and_big(&mut scenario)?;
    assert_eq!(append_paths(&scenario.root, joinrel)?.len(), 1);

    for &member in &scenario.members {
        let rel = scenario.root.rel(member)?;
        assert_eq!(rel.attr_needed.get(&2), Some(&Relids::from([5])), "member {}", rel.name);
        assert!(!rel.attr_needed.contains_key(&1), "member {}", rel.name);
    }
    Ok(())
}

#[test]
fn test_subquery_outer_no_rewrite() -> Result<()> {
    let options = PartitionOptions {
        subquery_parent: true,
        ..PartitionOptions::default()
    };
    let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), options)?;
    let joinrel = join_part_and_big(&mut scenario)?;

    assert!(append_paths(&scenario.root, joinrel)?.is_empty());
    assert!(scenario.root.rel(joinrel)?.has_paths());
    assert!(scenario.root.find_join_rel(&Relids::from([11, 2])).is_none());
    Ok(())
}

#[test]
fn test_semi_join_not_pulled_up() -> Result<()> {
    let mut scenario = partition_scenario(keep_all_planner(PlannerConfig::default()), PartitionOptions::default())?;
    scenario.root.join_info_list.push(
        SpecialJoinInfo::new(JoinType::Semi, Relids::from([1]), Relids::from([2]))
            .with_semi_rhs_exprs(vec![Expression::column(2, 1)]),
    );
    let joinrel = join_part_and_big(&mut scenario)?;

    let paths = scenario.root.rel(joinrel)?.pathlist.clone();
    assert!(paths.iter().any(|p| p.join_info().is_some_and(|j| j.jointype == JoinType::Semi)));
    assert!(append_paths(&scenario.root, joinrel)?.is_empty());
    assert!(scenario.root.find_join_rel(&Relids::from([11, 2])).is_none());
    Ok(())
}
