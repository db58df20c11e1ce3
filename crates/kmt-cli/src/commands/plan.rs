//! `kmt plan` — Show the resolved services without writing anything.

use clap::Args;
use kmt_compose::graph::DependencyGraph;
use kmt_compose::pipeline;
use kmt_compose::resolver::ResolvedService;

use super::InputArgs;
use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Definition inputs.
    #[command(flatten)]
    pub input: InputArgs,

    /// Print the resolved services as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `plan` command.
///
/// Resolves the requested services, applies every override layer, and
/// prints the result with dependencies before their dependents.
///
/// # Errors
///
/// Returns an error if loading, resolution, or overriding fails.
#[allow(clippy::print_stdout)]
pub async fn execute(args: PlanArgs) -> anyhow::Result<()> {
    let inputs = args.input.load().await?;
    let resolved = pipeline::resolve(&inputs.catalog, &inputs.application, &inputs.environment)?;

    let graph = DependencyGraph::from_resolved(&resolved);
    for cycle in graph.cycles() {
        tracing::warn!(services = %cycle.join(", "), "services depend on each other");
    }
    let ordered: Vec<&ResolvedService> = graph
        .resolve_order()
        .iter()
        .filter_map(|name| resolved.get(name))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ordered)?);
        return Ok(());
    }

    let title = format!(
        "Resolution plan for environment: {}",
        inputs.environment.environment.name
    );
    println!("{title}");
    println!("{}", output::rule(title.chars().count()));
    println!();
    for service in &ordered {
        for line in output::format_service(service) {
            println!("{line}");
        }
    }
    println!();
    println!("  {} service(s) resolved.", ordered.len());

    Ok(())
}
