//! Table and Jsonnet rendering

use analyse::index::FileStats;
use analyse::{BlockSummary, GenericAttrSummary};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use humansize::{format_size, DECIMAL};

/// Attributes per scope suggested as dedicated columns
const JSONNET_ATTRIBUTES: usize = 10;

#[derive(Args, Debug, Clone)]
pub struct PrintArgs {
    /// Number of attributes to display, defaults to analyse.num_attr
    #[arg(long)]
    pub num_attr: Option<usize>,

    /// Generate overrides Jsonnet for dedicated columns
    #[arg(long)]
    pub generate_jsonnet: bool,

    /// Print only a single line of top attributes per scope
    #[arg(long)]
    pub simple_summary: bool,

    /// Print the full table summary
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub print_full_summary: bool,
}

pub fn print_block_summary(summary: &BlockSummary, args: &PrintArgs, default_num_attr: usize) {
    let num_attr = args.num_attr.unwrap_or(default_num_attr);
    let mut scopes = vec![("span", &summary.span), ("resource", &summary.resource)];
    if let Some(event) = &summary.event {
        scopes.push(("event", event));
    }

    if args.print_full_summary {
        for (scope, scope_summary) in &scopes {
            println!();
            println!("{}", summary_table(scope, num_attr, scope_summary));
        }
    }

    if args.simple_summary {
        println!();
        for (scope, scope_summary) in &scopes {
            println!("{}", simple_summary(scope, num_attr, scope_summary));
        }
    }

    if args.generate_jsonnet {
        println!();
        println!("{}", dedicated_columns_jsonnet(summary));
    }
}

/// Largest attributes of a scope with their share of the scope total
pub fn summary_table(scope: &str, num_attr: usize, summary: &GenericAttrSummary) -> String {
    let top = summary.top_n(num_attr);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Name", "Size", "Share", "Cardinality"]);

    for attr in &top {
        let name = if summary.is_dedicated(&attr.name) {
            format!("{} (dedicated)", attr.name)
        } else {
            attr.name.clone()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format_size(attr.bytes, DECIMAL)),
            Cell::new(format!("{:.2}%", summary.percentage(attr.bytes))),
            Cell::new(summary.distinct_values(&attr.name)),
        ]);
    }

    let array_bytes: u64 = summary.array_attributes.values().sum();
    format!(
        "Top {} {scope} attributes by size (total {})\nArray attributes: {} ({})\n{table}",
        top.len(),
        format_size(summary.total_bytes, DECIMAL),
        summary.array_attributes.len(),
        format_size(array_bytes, DECIMAL),
    )
}

/// Quoted names of the largest attributes on one line
pub fn simple_summary(scope: &str, num_attr: usize, summary: &GenericAttrSummary) -> String {
    let names: Vec<String> = summary
        .top_n(num_attr)
        .iter()
        .map(|attr| format!("\"{}\"", attr.name))
        .collect();
    format!("{scope} attributes: {}", names.join(", "))
}

/// Dedicated column overrides for the largest span and resource attributes
pub fn dedicated_columns_jsonnet(summary: &BlockSummary) -> String {
    let mut out = String::from("parquet_dedicated_columns: [\n");
    for (scope, scope_summary) in [("span", &summary.span), ("resource", &summary.resource)] {
        for attr in scope_summary.top_n(JSONNET_ATTRIBUTES) {
            out.push_str(&format!(
                " {{ scope: '{scope}', name: '{}', type: 'string' }},\n",
                attr.name
            ));
        }
    }
    out.push_str("],");
    out
}

pub fn file_stats_table(stats: &FileStats) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    for (name, count) in [
        ("Traces", stats.traces),
        ("Resources", stats.resources),
        ("Spans", stats.spans),
        ("Events", stats.events),
        ("Links", stats.links),
        ("Arrays", stats.arrays),
    ] {
        table.add_row(vec![Cell::new(name), Cell::new(count)]);
    }
    table.to_string()
}

/// Attributes ordered by scope, then by occurrence count
pub fn attribute_stats_table(stats: &FileStats) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Name", "Scopes", "Count", "Cardinality"]);

    for attr in stats.sorted_for_display() {
        table.add_row(vec![
            Cell::new(&attr.key),
            Cell::new(attr.scope_mask),
            Cell::new(attr.count),
            Cell::new(attr.cardinality()),
        ]);
    }
    table.to_string()
}
