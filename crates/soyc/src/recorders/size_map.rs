use std::io::Write;

use anyhow::{Context, Result};
use log::{debug, trace};

use super::XML_PROLOG;
use crate::{
    compile_output::{CompileOutput, JsName, NameIndex, NameTarget},
    program::Program,
    writer::{FlushingWriter, escape_attr},
};

/// What an emitted name accounts for in the sizes document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Method,
    Type,
    String,
    Var,
}

impl SizeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::Type => "type",
            Self::String => "string",
            Self::Var => "var",
        }
    }
}

/// Classify an emitted name; the first of method, type, string literal and var wins
pub fn classify(
    program: &Program,
    names: &NameIndex,
    name: &JsName,
) -> Result<(SizeClass, String)> {
    match names.target(name) {
        Some(NameTarget::Method(method)) => {
            Ok((SizeClass::Method, program.method_signature(method)?))
        }
        Some(NameTarget::Type(ty)) => Ok((SizeClass::Type, program.type_decl(ty)?.name.clone())),
        None => match names.string_literal(name) {
            Some(literal) => Ok((SizeClass::String, literal.to_owned())),
            None => Ok((SizeClass::Var, name.short_ident.clone())),
        },
    }
}

/// Write the sizes document: one `<sizemap>` per fragment, one `<size>` per name
pub fn record_size_maps<W: Write>(
    program: &Program,
    compile: &CompileOutput,
    mut out: FlushingWriter<W>,
) -> Result<W> {
    out.push_str(XML_PROLOG)?;
    out.push_str("<sizemaps>\n")?;

    for (fragment, output) in compile.fragments.iter().enumerate() {
        let breakdown = &output.sizes;
        writeln!(
            out,
            "<sizemap fragment=\"{fragment}\" size=\"{}\">",
            breakdown.size
        )?;
        for (name, &size) in &breakdown.sizes {
            let (class, description) = classify(program, &compile.names, name)
                .with_context(|| format!("Cannot classify '{}' in fragment {fragment}", name.ident))?;
            trace!("{} {} -> {} bytes", class.as_str(), description, size);
            writeln!(
                out,
                "<size type=\"{}\" ref=\"{}\" size=\"{size}\"/>",
                class.as_str(),
                escape_attr(&description)
            )?;
        }
        out.push_str("</sizemap>\n")?;
        debug!(
            "Fragment {fragment}: {} bytes over {} names",
            breakdown.size,
            breakdown.sizes.len()
        );
    }

    out.push_str("</sizemaps>\n")?;
    Ok(out.finish()?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        compile_output::{Fragment, SizeBreakdown},
        program::{MethodDecl, ProgramBuilder, TypeDecl},
    };

    fn render(program: &Program, compile: &CompileOutput) -> String {
        let out = record_size_maps(program, compile, FlushingWriter::new(Vec::new())).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_classification_precedence() {
        let mut builder = ProgramBuilder::new();
        let string = builder.add_type(TypeDecl::new("java.lang.String"));
        let substring = builder.add_method(
            MethodDecl::new("substring", Some(string))
                .params(["I", "I"])
                .returns("Ljava/lang/String;"),
        );
        let program = builder.build().unwrap();

        let mut names = NameIndex::new();
        names.map_method("substring", substring);
        // Also a literal, but the method wins
        names.map_string_literal("substring", "substring");
        names.map_type("String", string);
        names.map_string_literal("$s1", "Hello <world>");

        let check = |ident: &str, short: &str| {
            classify(&program, &names, &JsName::new(ident, short)).unwrap()
        };
        assert_eq!(
            check("substring", "a"),
            (
                SizeClass::Method,
                "java.lang.String::substring(II)Ljava/lang/String;".to_owned()
            )
        );
        assert_eq!(
            check("String", "b"),
            (SizeClass::Type, "java.lang.String".to_owned())
        );
        assert_eq!(
            check("$s1", "c"),
            (SizeClass::String, "Hello <world>".to_owned())
        );
        assert_eq!(check("tmp$1", "d"), (SizeClass::Var, "d".to_owned()));
    }

    #[test]
    fn test_document_per_fragment() {
        let mut builder = ProgramBuilder::new();
        let app = builder.add_type(TypeDecl::new("App"));
        let main = builder.add_method(MethodDecl::new("main", Some(app)));
        let program = builder.build().unwrap();

        let mut names = NameIndex::new();
        names.map_method("App.main", main);
        names.map_string_literal("$s0", "a \"quoted\" & <tagged> string");

        let mut first = SizeBreakdown {
            size: 120,
            ..SizeBreakdown::default()
        };
        first.sizes.insert(JsName::new("App.main", "m"), 100);
        first.sizes.insert(JsName::new("$s0", "s"), 20);
        let mut second = SizeBreakdown {
            size: 7,
            ..SizeBreakdown::default()
        };
        second.sizes.insert(JsName::new("x$0", "x"), 7);

        let compile = CompileOutput {
            fragments: vec![
                Fragment {
                    sizes: first,
                    ..Fragment::default()
                },
                Fragment {
                    sizes: second,
                    ..Fragment::default()
                },
            ],
            names,
        };

        assert_eq!(
            render(&program, &compile),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <sizemaps>\n\
             <sizemap fragment=\"0\" size=\"120\">\n\
             <size type=\"method\" ref=\"App::main()V\" size=\"100\"/>\n\
             <size type=\"string\" ref=\"a &quot;quoted&quot; &amp; &lt;tagged&gt; string\" size=\"20\"/>\n\
             </sizemap>\n\
             <sizemap fragment=\"1\" size=\"7\">\n\
             <size type=\"var\" ref=\"x\" size=\"7\"/>\n\
             </sizemap>\n\
             </sizemaps>\n"
        );
    }

    #[test]
    fn test_multiline_literal_survives_reparse() {
        let program = ProgramBuilder::new().build().unwrap();
        let mut names = NameIndex::new();
        names.map_string_literal("$s0", "first line\n\tindented\r\n");
        let mut sizes = SizeBreakdown {
            size: 24,
            ..SizeBreakdown::default()
        };
        sizes.sizes.insert(JsName::new("$s0", "s"), 24);
        let compile = CompileOutput {
            fragments: vec![Fragment {
                sizes,
                ..Fragment::default()
            }],
            names,
        };

        let doc = render(&program, &compile);
        assert!(doc.contains("ref=\"first line&#10;&#9;indented&#13;&#10;\""), "{doc}");
        let parsed = roxmltree::Document::parse(&doc).unwrap();
        let size = parsed
            .descendants()
            .find(|node| node.has_tag_name("size"))
            .unwrap();
        assert_eq!(size.attribute("ref"), Some("first line\n\tindented\r\n"));
    }

    #[test]
    fn test_empty_document_is_well_formed() {
        let program = ProgramBuilder::new().build().unwrap();
        assert_eq!(
            render(&program, &CompileOutput::default()),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<sizemaps>\n</sizemaps>\n"
        );
    }
}
