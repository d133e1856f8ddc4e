//! Console rendering of a query's progress.

use std::io::{self, Write};

use serde_json::Value;

use crate::capabilities::{Capability, CapabilityPayload, CapabilityResult};

fn rule<W: Write>(out: &mut W, width: usize) -> io::Result<()> {
    writeln!(out, "{}", "-".repeat(width))
}

pub fn query_header<W: Write>(out: &mut W, query: &str) -> io::Result<()> {
    writeln!(out, "\nProcessing query: {query}")?;
    rule(out, 50)
}

pub fn thinking<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\nThinking...")?;
    out.flush()
}

pub fn tool_call<W: Write>(out: &mut W, capability: Capability, args: &Value) -> io::Result<()> {
    match capability {
        Capability::Wikipedia => {
            let topic = args
                .get("search_query")
                .and_then(Value::as_str)
                .unwrap_or_default();
            writeln!(out, "\nSearching Wikipedia for: {topic}")
        }
        Capability::ProductSearch => writeln!(out, "\nTool Call Arguments: {args}"),
    }
}

pub fn tool_result<W: Write>(
    out: &mut W,
    capability: Capability,
    result: &CapabilityResult,
) -> io::Result<()> {
    match capability {
        Capability::Wikipedia => writeln!(out, "\nWikipedia Article:")?,
        Capability::ProductSearch => writeln!(out, "\nSearch Results:")?,
    }
    rule(out, 40)?;

    match result {
        CapabilityResult::Success(CapabilityPayload::Products(found)) => {
            if found.total == 0 {
                writeln!(out, "No products found matching your criteria.")?;
            }
            for product in &found.products {
                writeln!(out, "• {}: ${:.2}", product.name, product.price)?;
            }
        }
        CapabilityResult::Success(CapabilityPayload::Article(article)) => {
            writeln!(out, "Title: {}", article.title)?;
            rule(out, 40)?;
            writeln!(out, "{}", article.content)?;
        }
        CapabilityResult::Error { message } => writeln!(out, "Error: {message}")?,
    }
    rule(out, 40)
}

pub fn generating<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\nGenerating response (streaming):")?;
    out.flush()
}

pub fn direct<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\nDirect response (streaming):")?;
    out.flush()
}

/// Writes a fragment as-is and flushes so it shows up immediately.
pub fn fragment<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    write!(out, "{text}")?;
    out.flush()
}

pub fn finish<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\n")?;
    out.flush()
}

pub fn failure<W: Write>(out: &mut W, err: &dyn std::fmt::Display) -> io::Result<()> {
    writeln!(out, "\nError: {err}")?;
    out.flush()
}
