use std::io::Write;

use anyhow::Result;

use super::XML_PROLOG;
use crate::writer::{FlushingWriter, escape_attr};

/// One permutation's report as listed in the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Report file the entry points at, relative to the manifest
    pub href: String,
    /// Each set of deferred-binding property values this permutation was compiled for
    pub permutations: Vec<Vec<(String, String)>>,
}

/// Write `manifest.xml`, listing every permutation's report
pub fn write_manifest<W: Write>(entries: &[ManifestEntry], mut out: FlushingWriter<W>) -> Result<W> {
    out.push_str(XML_PROLOG)?;
    out.push_str("<soyc-manifest>\n")?;
    for entry in entries {
        writeln!(out, "<report href=\"{}\">", escape_attr(&entry.href))?;
        for properties in &entry.permutations {
            if properties.is_empty() {
                out.push_str("<permutation/>\n")?;
                continue;
            }
            out.push_str("<permutation>\n")?;
            for (name, value) in properties {
                writeln!(
                    out,
                    "<property name=\"{}\" value=\"{}\"/>",
                    escape_attr(name),
                    escape_attr(value)
                )?;
            }
            out.push_str("</permutation>\n")?;
        }
        out.push_str("</report>\n")?;
    }
    out.push_str("</soyc-manifest>\n")?;
    Ok(out.finish()?)
}
