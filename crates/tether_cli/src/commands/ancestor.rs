//! Ancestor command - cross-session context retrieval.

use super::open_workspace;
use super::transcript::{parse_role, print_entry};
use anyhow::{Context, Result};
use console::style;
use tether_core::{
    AncestorContext, AncestorQuery, DiscontinuityReport, Include, NodeId, Resolution,
    TranscriptFilter,
};

/// Options for `tether ancestor`.
pub struct AncestorArgs<'a> {
    pub node: Option<&'a str>,
    pub depth: Option<usize>,
    pub include: &'a str,
    pub grep: Option<&'a str>,
    pub role: Option<&'a str>,
    pub last: Option<usize>,
    pub format: &'a str,
}

/// Resolve ancestor context from a node (the active one by default).
pub fn run(args: AncestorArgs<'_>) -> Result<()> {
    let include = Include::parse(args.include).with_context(|| {
        format!(
            "Unsupported include list {:?}. Use description, diff, transcript or all.",
            args.include
        )
    })?;

    let transcript_filter = if args.grep.is_some() || args.role.is_some() || args.last.is_some() {
        Some(TranscriptFilter {
            text: args.grep.map(str::to_string),
            role: args.role.map(parse_role).transpose()?,
            last: args.last,
        })
    } else {
        None
    };

    let query = AncestorQuery {
        depth: args.depth,
        include,
        transcript_filter,
    };

    let ws = open_workspace()?;
    let node = args.node.map(NodeId::new);
    let resolution = ws
        .query_ancestor(node.as_ref(), &query)
        .context("Failed to resolve ancestor context")?;

    match args.format {
        "json" => {
            let json = serde_json::to_string_pretty(&resolution)
                .context("Failed to serialize to JSON")?;
            println!("{}", json);
        }
        "text" => match &resolution {
            Resolution::Context(ctx) => print_context(ctx),
            Resolution::Discontinuity(report) => print_discontinuity(report),
        },
        _ => {
            anyhow::bail!("Unsupported format: {}. Use 'json' or 'text'.", args.format);
        }
    }

    Ok(())
}

fn print_context(ctx: &AncestorContext) {
    if ctx.slices.is_empty() {
        println!("No linked ancestors within {} hop(s) of {}", ctx.depth, ctx.from);
    }

    for slice in &ctx.slices {
        println!(
            "{} {} (session {})",
            style(format!("hop {}", slice.hop)).bold(),
            style(&slice.node_id).cyan(),
            slice.session_id
        );
        if let Some(description) = &slice.description {
            for line in description.lines() {
                println!("  {}", line);
            }
        }
        if let Some(transcript) = &slice.transcript {
            println!("  {}", style(format!("{} turn(s)", transcript.len())).dim());
            for entry in transcript {
                print_entry(entry);
            }
        }
        if let Some(diff) = &slice.diff {
            if !diff.is_empty() {
                println!("{}", diff.trim_end());
            }
        }
        println!();
    }

    if !ctx.skipped.is_empty() {
        let skipped: Vec<&str> = ctx.skipped.iter().map(NodeId::as_str).collect();
        println!(
            "{}",
            style(format!("Skipped unlinked: {}", skipped.join(", "))).dim()
        );
    }
    if ctx.reached_graph_root {
        println!("{}", style("Reached the root of the graph").dim());
    }
}

fn print_discontinuity(report: &DiscontinuityReport) {
    println!(
        "{} ancestor chain of {} broken at hop {} ({})",
        style("discontinuity:").yellow().bold(),
        report.from,
        report.hop,
        report.node_id
    );
    println!("  {}", report.reason);
    if report.session_retired {
        println!("  The affected session was marked non-resumable.");
    }
}
