use std::{collections::BTreeMap, io::Write, sync::Arc};

use anyhow::{Context, Result};
use log::debug;

use super::XML_PROLOG;
use crate::{
    members::{ClassMember, HasDependencies, Member, MemberFactory, MethodMember},
    writer::{FlushingWriter, escape_attr},
};

/// Write the members document for everything `factory` canonicalized
///
/// Supertypes and overridden methods are resolved first, so classes reached
/// only through an override are listed as well.
pub fn write_members<W: Write>(factory: &MemberFactory<'_>, mut out: FlushingWriter<W>) -> Result<W> {
    let classes = resolve_overrides(factory)?;

    let mut packages: BTreeMap<&str, Vec<&Arc<ClassMember>>> = BTreeMap::new();
    for class in &classes {
        packages.entry(class.package()).or_default().push(class);
    }

    out.push_str(XML_PROLOG)?;
    out.push_str("<soyc>\n<members>\n")?;
    for (package, classes) in &packages {
        writeln!(out, "<package id=\"{}\">", escape_attr(package))?;
        for class in classes {
            write_class(factory, class, &mut out)?;
        }
        out.push_str("</package>\n")?;
    }
    out.push_str("</members>\n</soyc>\n")?;

    debug!(
        "Wrote {} classes in {} packages",
        classes.len(),
        packages.len()
    );
    Ok(out.finish()?)
}

/// Compute overrides until no new class shows up; returns every class, sorted
fn resolve_overrides(factory: &MemberFactory<'_>) -> Result<Vec<Arc<ClassMember>>> {
    loop {
        let classes = factory.classes();
        for class in &classes {
            class
                .overrides(factory)
                .with_context(|| format!("Cannot resolve supertypes of {}", class.source_name()))?;
            for method in class.methods() {
                method.overrides(factory).with_context(|| {
                    format!("Cannot resolve overrides of {}", method.source_name())
                })?;
            }
        }
        if factory.class_count() == classes.len() {
            return Ok(classes);
        }
    }
}

fn write_class<W: Write>(
    factory: &MemberFactory<'_>,
    class: &ClassMember,
    out: &mut FlushingWriter<W>,
) -> Result<()> {
    write!(
        out,
        "<class id=\"{}\" name=\"{}\"",
        escape_attr(class.source_name()),
        escape_attr(class.simple_name())
    )?;
    write_js_name(class.js_name(), out)?;
    out.push_str(">\n")?;

    let overrides = class.overrides(factory)?;
    write_overrides(overrides.iter().map(|c| c.source_name()), out)?;
    write_depends(&class.dependencies(), out)?;
    for method in class.methods() {
        write_method(factory, &method, out)?;
    }
    for field in class.fields() {
        write!(out, "<field id=\"{}\"", escape_attr(field.source_name()))?;
        write_js_name(field.js_name(), out)?;
        out.push_str("/>\n")?;
    }

    out.push_str("</class>\n")?;
    Ok(())
}

fn write_method<W: Write>(
    factory: &MemberFactory<'_>,
    method: &MethodMember,
    out: &mut FlushingWriter<W>,
) -> Result<()> {
    let overrides = method.overrides(factory)?;
    let dependencies = method.dependencies();
    let aliases = method.js_aliases();

    write!(out, "<method id=\"{}\"", escape_attr(method.source_name()))?;
    write_js_name(method.js_name(), out)?;
    if overrides.is_empty() && dependencies.is_empty() && aliases.is_empty() {
        out.push_str("/>\n")?;
        return Ok(());
    }
    out.push_str(">\n")?;

    if !aliases.is_empty() {
        out.push_str("<aliases>\n")?;
        for alias in aliases {
            writeln!(out, "<alias jsName=\"{}\"/>", escape_attr(alias))?;
        }
        out.push_str("</aliases>\n")?;
    }
    write_overrides(overrides.iter().map(|m| m.source_name()), out)?;
    write_depends(&dependencies, out)?;

    out.push_str("</method>\n")?;
    Ok(())
}

fn write_js_name<W: Write>(js_name: Option<&str>, out: &mut FlushingWriter<W>) -> Result<()> {
    if let Some(js_name) = js_name {
        write!(out, " jsName=\"{}\"", escape_attr(js_name))?;
    }
    Ok(())
}

fn write_overrides<'m, W: Write>(
    names: impl ExactSizeIterator<Item = &'m str>,
    out: &mut FlushingWriter<W>,
) -> Result<()> {
    if names.len() == 0 {
        return Ok(());
    }
    out.push_str("<override>\n")?;
    for name in names {
        writeln!(out, "<of idref=\"{}\"/>", escape_attr(name))?;
    }
    out.push_str("</override>\n")?;
    Ok(())
}

fn write_depends<W: Write>(dependencies: &[Member], out: &mut FlushingWriter<W>) -> Result<()> {
    if dependencies.is_empty() {
        return Ok(());
    }
    out.push_str("<depends>\n")?;
    for dependency in dependencies {
        writeln!(out, "<on idref=\"{}\"/>", escape_attr(dependency.source_name()))?;
    }
    out.push_str("</depends>\n")?;
    Ok(())
}
