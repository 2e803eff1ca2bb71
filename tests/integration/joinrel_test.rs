use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bayun_joinpath::common::RelIndex;
use bayun_joinpath::planner::expr::{ColumnRef, Expression, Value};
use bayun_joinpath::planner::joininfo::SpecialJoinInfo;
use bayun_joinpath::{JoinType, PlannerConfig, PlannerInfo, Relids, make_join_rel};

#[path = "../common/mod.rs"]
mod common;
use common::{
    Row, TestData, canonical, eq_clause, execute, join_type_of, keep_all_planner, paths_of, planner, with_seq_scan,
};

fn two_tables(mut root: PlannerInfo, seed: u64) -> Result<(PlannerInfo, RelIndex, RelIndex, TestData)> {
    let a = root.add_base_rel(1, "a", 2, 50.0);
    let b = root.add_base_rel(2, "b", 2, 80.0);
    with_seq_scan(&mut root, a)?;
    with_seq_scan(&mut root, b)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = TestData::default();
    data.insert(1, (0..50).map(|i| vec![rng.gen_range(0..30), i]).collect());
    data.insert(2, (0..80).map(|i| vec![rng.gen_range(0..30), i]).collect());
    Ok((root, a, b, data))
}

/// Rows of `relid` only, in canonical form
fn project(rows: Vec<Row>, relid: u32) -> Vec<Vec<(u32, i16, i64)>> {
    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().filter(|(col, _)| col.relid == relid).collect())
        .collect();
    canonical(rows)
}

fn matching_keys(data: &TestData, relid: u32) -> BTreeSet<i64> {
    data.rows(relid).iter().map(|row| row[0]).collect()
}

fn join(root: &mut PlannerInfo, rel1: RelIndex, rel2: RelIndex) -> Result<RelIndex> {
    make_join_rel(root, rel1, rel2)?.ok_or_else(|| anyhow!("relations should be joinable"))
}

#[test]
fn test_join_order_constraints() -> Result<()> {
    let mut root = planner();
    let a = root.add_base_rel(1, "a", 2, 100.0);
    let b = root.add_base_rel(2, "b", 2, 100.0);
    let c = root.add_base_rel(3, "c", 2, 100.0);
    for rel in [a, b, c] {
        with_seq_scan(&mut root, rel)?;
    }
    root.add_outer_join_clause(eq_clause((1, 1), (2, 1)));
    root.add_join_clause(eq_clause((2, 2), (3, 2)));
    root.join_info_list
        .push(SpecialJoinInfo::new(JoinType::Left, Relids::from([1]), Relids::from([2, 3])));

    // a may not be joined to part of the nullable side
    assert!(make_join_rel(&mut root, a, b)?.is_none());
    assert!(make_join_rel(&mut root, b, a)?.is_none());
    // overlapping inputs
    assert!(make_join_rel(&mut root, b, b)?.is_none());

    let bc = join(&mut root, b, c)?;
    root.set_cheapest(bc)?;
    assert!(
        paths_of(&root, bc)?
            .iter()
            .all(|p| join_type_of(p) == Some(JoinType::Inner))
    );

    let abc = join(&mut root, bc, a)?;
    let rel = root.rel(abc)?;
    assert_eq!(rel.relids, Relids::from([1, 2, 3]));
    assert!(rel.has_paths());
    for path in &rel.pathlist {
        let join = path.join_info().ok_or_else(|| anyhow!("not a join"))?;
        match join.jointype {
            JoinType::Left => assert_eq!(join.outer.parent_relids, Relids::from([1])),
            JoinType::Right => assert_eq!(join.inner.parent_relids, Relids::from([1])),
            other => panic!("unexpected {:?} join", other),
        }
    }
    Ok(())
}

#[test]
fn test_join_rel_shape() -> Result<()> {
    let (mut root, a, b, _) = two_tables(planner(), 1)?;
    root.add_join_clause(eq_clause((1, 1), (2, 1)));
    let joinrel = join(&mut root, a, b)?;

    let rel = root.rel(joinrel)?;
    assert_eq!(rel.name, "a_b");
    assert_eq!(rel.reltarget.len(), 4);
    assert!(rel.rows >= 1.0 && rel.rows < 50.0 * 80.0);
    assert_eq!(root.find_join_rel(&Relids::from([1, 2])), Some(joinrel));
    // the reverse order finds the same relation
    assert_eq!(join(&mut root, b, a)?, joinrel);
    Ok(())
}

#[test]
fn test_semi_join_paths_agree() -> Result<()> {
    let (mut root, a, b, data) = two_tables(keep_all_planner(PlannerConfig::default()), 3)?;
    root.add_join_clause(eq_clause((1, 1), (2, 1)));
    root.join_info_list.push(
        SpecialJoinInfo::new(JoinType::Semi, Relids::from([1]), Relids::from([2]))
            .with_semi_rhs_exprs(vec![Expression::column(2, 1)]),
    );
    let joinrel = join(&mut root, a, b)?;

    let keys = matching_keys(&data, 2);
    let expected = canonical(
        data.rows(1)
            .iter()
            .filter(|row| keys.contains(&row[0]))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let col = ColumnRef {
                            relid: 1,
                            attno: i as i16 + 1,
                        };
                        (col, Value::Integer(*v))
                    })
                    .collect()
            })
            .collect(),
    );

    let paths = paths_of(&root, joinrel)?;
    let jointypes: BTreeSet<String> = paths
        .iter()
        .filter_map(|p| join_type_of(p))
        .map(|jt| format!("{:?}", jt))
        .collect();
    // a plain semi join, and inner joins over a duplicate-free b
    assert!(jointypes.contains("Semi"));
    assert!(jointypes.contains("Inner"));
    assert!(paths.iter().any(|p| {
        p.join_info()
            .is_some_and(|j| j.inner.node_name() == "Unique" || j.outer.node_name() == "Unique")
    }));

    for path in &paths {
        let rows = execute(&root, &data, path, &Row::new())?;
        assert_eq!(project(rows, 1), expected, "wrong rows from\n{}", path);
    }
    Ok(())
}

#[test]
fn test_anti_join_paths_agree() -> Result<()> {
    let (mut root, a, b, data) = two_tables(keep_all_planner(PlannerConfig::default()), 5)?;
    root.add_outer_join_clause(eq_clause((1, 1), (2, 1)));
    root.join_info_list
        .push(SpecialJoinInfo::new(JoinType::Anti, Relids::from([1]), Relids::from([2])));
    let joinrel = join(&mut root, a, b)?;

    let keys = matching_keys(&data, 2);
    let expected_count = data.rows(1).iter().filter(|row| !keys.contains(&row[0])).count();

    let paths = paths_of(&root, joinrel)?;
    assert!(!paths.is_empty());
    for path in &paths {
        assert_eq!(join_type_of(path), Some(JoinType::Anti));
        assert_eq!(path.join_info().map(|j| j.outer.parent_relids.clone()), Some(Relids::from([1])));
        let rows = execute(&root, &data, path, &Row::new())?;
        assert_eq!(rows.len(), expected_count, "wrong rows from\n{}", path);
    }
    Ok(())
}

#[test]
fn test_left_join_paths_agree() -> Result<()> {
    let (mut root, a, b, data) = two_tables(keep_all_planner(PlannerConfig::default()), 8)?;
    root.add_outer_join_clause(eq_clause((1, 1), (2, 1)));
    root.join_info_list
        .push(SpecialJoinInfo::new(JoinType::Left, Relids::from([1]), Relids::from([2])));
    let joinrel = join(&mut root, a, b)?;

    let paths = paths_of(&root, joinrel)?;
    assert!(
        paths
            .iter()
            .all(|p| matches!(join_type_of(p), Some(JoinType::Left | JoinType::Right)))
    );
    // a right join can only be a merge or hash join
    assert!(
        paths
            .iter()
            .filter(|p| join_type_of(p) == Some(JoinType::Right))
            .all(|p| p.node_name() != "Nested Loop")
    );

    let reference = paths
        .iter()
        .find(|p| join_type_of(p) == Some(JoinType::Left))
        .ok_or_else(|| anyhow!("no left join path"))?;
    let expected = canonical(execute(&root, &data, reference, &Row::new())?);
    let a_rows = data.rows(1).len();
    assert!(expected.len() >= a_rows);
    for path in &paths {
        assert_eq!(canonical(execute(&root, &data, path, &Row::new())?), expected, "wrong rows from\n{}", path);
    }
    Ok(())
}

#[test]
fn test_restrictlist_translated_to_members() -> Result<()> {
    let mut root = planner();
    root.add_base_rel(1, "part", 2, 300.0);
    root.add_base_rel(2, "other", 2, 100.0);
    root.add_base_rel(3, "third", 2, 100.0);
    root.add_append_member(1, 11, "part_0", 100.0, Vec::new())?;
    root.add_join_clause(eq_clause((1, 1), (2, 1)));

    let parent_level = root.build_joinrel_restrictlist(&Relids::from([1]), &Relids::from([2]));
    assert_eq!(parent_level.len(), 1);
    assert_eq!(
        parent_level[0].clause,
        Expression::eq(Expression::column(1, 1), Expression::column(2, 1))
    );

    let member_level = root.build_joinrel_restrictlist(&Relids::from([11]), &Relids::from([2]));
    assert_eq!(member_level.len(), 1);
    assert_eq!(
        member_level[0].clause,
        Expression::eq(Expression::column(11, 1), Expression::column(2, 1))
    );
    assert_eq!(member_level[0].clause_relids, Relids::from([2, 11]));

    assert!(root.build_joinrel_restrictlist(&Relids::from([11]), &Relids::from([3])).is_empty());
    Ok(())
}
