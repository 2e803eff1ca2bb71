use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flexi_logger::Logger;
use log::info;

use bayun_joinpath::common::{RelIndex, Relids};
use bayun_joinpath::planner::expr::{Expression, Operator};
use bayun_joinpath::planner::path::ParamPathInfo;
use bayun_joinpath::planner::pathnode::create_append_path;
use bayun_joinpath::planner::restrictinfo::RestrictInfo;
use bayun_joinpath::{PlannerConfig, PlannerInfo, ScanMethod, make_join_rel};

#[derive(Parser)]
#[command(author, version, about = "joinplan - show the join paths generated for sample queries")]
struct Cli {
    /// Planner configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not generate merge joins
    #[arg(long)]
    no_mergejoin: bool,

    /// Do not generate hash joins
    #[arg(long)]
    no_hashjoin: bool,

    /// Price nested loops out
    #[arg(long)]
    no_nestloop: bool,

    /// Do not materialize nested loop inner sides
    #[arg(long)]
    no_material: bool,

    /// Do not push joins below partitioned tables
    #[arg(long)]
    no_append_pullup: bool,

    /// Log planner decisions (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Scenario to plan
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fact table joined to a dimension, with an index scan that needs two dimensions
    Star,

    /// Table partitioned by key modulo 3 joined to a large table on the key
    Partition {
        /// Rows per partition
        #[arg(long, default_value_t = 100_000)]
        partition_rows: u32,

        /// Rows of the joined table
        #[arg(long, default_value_t = 1_000_000)]
        inner_rows: u32,
    },

    /// Print the effective planner configuration as JSON
    Config,
}

impl Cli {
    fn planner_config(&self) -> Result<PlannerConfig> {
        let mut config = match &self.config {
            Some(path) => PlannerConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => PlannerConfig::default(),
        };
        config.enable_mergejoin &= !self.no_mergejoin;
        config.enable_hashjoin &= !self.no_hashjoin;
        config.enable_nestloop &= !self.no_nestloop;
        config.enable_material &= !self.no_material;
        config.enable_append_pullup &= !self.no_append_pullup;
        Ok(config)
    }
}

fn eq_clause(left: (u32, i16), right: (u32, i16)) -> RestrictInfo {
    RestrictInfo::new(Expression::eq(
        Expression::column(left.0, left.1),
        Expression::column(right.0, right.1),
    ))
}

/// fact(1) JOIN dim1(2), where fact has an index usable only with values
/// from both dim1 and dim2(3)
fn plan_star(root: &mut PlannerInfo) -> Result<RelIndex> {
    let fact = root.add_base_rel(1, "fact", 3, 1_000_000.0);
    let dim1 = root.add_base_rel(2, "dim1", 2, 100.0);
    let dim2 = root.add_base_rel(3, "dim2", 2, 100.0);
    let by_dim1 = root.add_join_clause(eq_clause((1, 1), (2, 1)));
    let by_dim2 = root.add_join_clause(eq_clause((1, 2), (3, 1)));

    for rel in [fact, dim1, dim2] {
        root.add_scan_path(rel, ScanMethod::Seq, Vec::new(), None)?;
    }
    let param = ParamPathInfo {
        req_outer: Relids::from([2, 3]),
        rows: 10.0,
        clauses: vec![by_dim1, by_dim2],
    };
    root.add_scan_path(
        fact,
        ScanMethod::Index {
            index_name: "fact_dims_idx".to_string(),
        },
        Vec::new(),
        Some(param),
    )?;
    for rel in [fact, dim1, dim2] {
        root.set_cheapest(rel)?;
    }

    make_join_rel(root, dim1, fact)?.context("dim1 and fact cannot be joined")
}

/// part(1) with members part_0..part_2 (c1 % 3 = n) JOIN big(2) ON c1
fn plan_partition(root: &mut PlannerInfo, partition_rows: f64, inner_rows: f64) -> Result<RelIndex> {
    let parent = root.add_base_rel(1, "part", 2, partition_rows * 3.0);
    let big = root.add_base_rel(2, "big", 2, inner_rows);

    let mut members = Vec::new();
    for n in 0..3 {
        let child_relid = 11 + n as u32;
        let check = Expression::eq(
            Expression::binary(
                Expression::column(child_relid, 1),
                Operator::Modulo,
                Expression::integer(3),
            ),
            Expression::integer(n),
        );
        let child = root.add_append_member(1, child_relid, &format!("part_{}", n), partition_rows, vec![check])?;
        root.add_scan_path(child, ScanMethod::Seq, Vec::new(), None)?;
        root.set_cheapest(child)?;
        members.push(child);
    }

    let subpaths = members
        .iter()
        .map(|&child| {
            root.rel(child)?
                .cheapest_total_path
                .clone()
                .context("partition without paths")
        })
        .collect::<Result<Vec<_>>>()?;
    let append = create_append_path(root, root.rel(parent)?, subpaths);
    root.add_path(parent, Rc::new(append))?;
    root.set_cheapest(parent)?;

    root.add_join_clause(eq_clause((1, 1), (2, 1)));
    let key = root.pathkey_for(&Expression::column(2, 1));
    root.add_scan_path(big, ScanMethod::Seq, Vec::new(), None)?;
    root.add_scan_path(
        big,
        ScanMethod::Index {
            index_name: "big_c1_idx".to_string(),
        },
        vec![key],
        None,
    )?;
    root.set_cheapest(big)?;

    make_join_rel(root, parent, big)?.context("part and big cannot be joined")
}

fn print_paths(root: &mut PlannerInfo, joinrel: RelIndex) -> Result<()> {
    root.set_cheapest(joinrel)?;
    let rel = root.rel(joinrel)?;
    println!("Join relation {} ({:.0} rows): {} paths", rel.relids, rel.rows, rel.pathlist.len());
    for (i, path) in rel.pathlist.iter().enumerate() {
        let marker = match &rel.cheapest_total_path {
            Some(cheapest) if Rc::ptr_eq(cheapest, path) => " (cheapest total)",
            _ => "",
        };
        println!();
        println!("Path {}{}:", i + 1, marker);
        print!("{}", path);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let _logger = Logger::try_with_str(level)?.log_to_stderr().start()?;

    let config = cli.planner_config()?;
    info!("Planner configuration: {:?}", config);

    match cli.command {
        Commands::Config => {
            println!("{}", config.to_json()?);
        }
        Commands::Star => {
            let mut root = PlannerInfo::new(config);
            let joinrel = plan_star(&mut root)?;
            print_paths(&mut root, joinrel)?;
        }
        Commands::Partition {
            partition_rows,
            inner_rows,
        } => {
            let mut root = PlannerInfo::new(config);
            let joinrel = plan_partition(&mut root, f64::from(partition_rows), f64::from(inner_rows))?;
            print_paths(&mut root, joinrel)?;
        }
    }
    Ok(())
}
