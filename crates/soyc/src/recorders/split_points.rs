use std::io::Write;

use anyhow::Result;
use log::debug;

use super::XML_PROLOG;
use crate::{
    program::Program,
    writer::{FlushingWriter, escape_attr},
};

/// Write the split points document: every split point by id, then the initial load sequence
pub fn write_split_points<W: Write>(program: &Program, mut out: FlushingWriter<W>) -> Result<W> {
    out.push_str(XML_PROLOG)?;
    out.push_str("<soyc>\n<splitpoints>\n")?;

    let mut split_points: Vec<_> = program.split_points().iter().collect();
    split_points.sort_by_key(|split_point| split_point.id);
    for split_point in &split_points {
        writeln!(
            out,
            "<splitpoint id=\"{}\" location=\"{}\"/>",
            split_point.id,
            escape_attr(&split_point.location)
        )?;
    }
    out.push_str("</splitpoints>\n")?;

    let sequence = program.initial_load_sequence();
    if !sequence.is_empty() {
        out.push_str("<initialseq>\n")?;
        for id in sequence {
            writeln!(out, "<splitpointref id=\"{id}\"/>")?;
        }
        out.push_str("</initialseq>\n")?;
    }

    out.push_str("</soyc>\n")?;
    debug!(
        "Wrote {} split points, {} in the initial sequence",
        split_points.len(),
        sequence.len()
    );
    Ok(out.finish()?)
}
