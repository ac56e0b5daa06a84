use sealgrid_core::{NodeIndex, RoleMap};
use sealgrid_planner::{Action, Consumption, MapReducePlanner, Planner, replay};

/// Print every batch the default planner issues for a pool, without
/// running anything.
pub fn plan(
    items: usize,
    nodes: usize,
    roots: RoleMap<NodeIndex>,
    consumption: Consumption,
    format: &str,
) -> anyhow::Result<()> {
    let mut planner = MapReducePlanner::new(items, nodes, roots)?;
    let batches = replay(&mut planner, consumption);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&batches)?);
        }
        _ => {
            println!(
                "{}",
                format_batches(&batches, planner.ranking().order(), planner.output_id())
            );
        }
    }
    Ok(())
}

fn format_batches(
    batches: &[Vec<Action>],
    order: &[NodeIndex],
    output_id: Option<u64>,
) -> String {
    let mut out = format!("node order: {order:?}\n");
    for (index, batch) in batches.iter().enumerate() {
        if batch.is_empty() {
            out.push_str(&format!("batch {index}: (waiting)\n"));
            continue;
        }
        out.push_str(&format!("batch {index}:\n"));
        for action in batch {
            out.push_str(&format!("  {action}\n"));
        }
    }
    if let Some(id) = output_id {
        out.push_str(&format!("final output: #{id}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lists_every_action() {
        let mut planner = MapReducePlanner::new(2, 1, RoleMap::uniform(0)).unwrap();
        let batches = replay(&mut planner, Consumption::Parallel);
        let text = format_batches(&batches, planner.ranking().order(), planner.output_id());

        assert!(text.starts_with("node order: [0]"));
        assert!(text.contains("node 0: map item 0 -> #0"));
        assert!(text.contains("node 0: reduce #0 + #1 -> #2"));
        assert!(text.ends_with("final output: #3"));
    }
}
