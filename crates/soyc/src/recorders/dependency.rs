use std::{io::Write, sync::Arc};

use anyhow::{Context, Result, bail};
use log::{debug, trace};

use super::XML_PROLOG;
use crate::{
    members::{HasDependencies, Member, MemberFactory, MethodMember},
    program::{MethodId, Program},
    reachability::{CallGraphAnalyzer, LivenessSink, Reachability},
    writer::{FlushingWriter, escape_attr},
};

/// Streams the dependencies document: why every live method is live
///
/// Each live method is written with the chain of callers that made it live,
/// nearest caller first. While recording, the dependency edges of the
/// involved members are filled in as well.
pub struct DependencyRecorder<'a, 'p, W: Write> {
    factory: &'a MemberFactory<'p>,
    program: &'p Program,
    out: FlushingWriter<W>,
    /// Named graphs written so far
    graphs: Vec<String>,
    open_graph: Option<String>,
    methods_written: usize,
}

impl<W: Write> std::fmt::Debug for DependencyRecorder<'_, '_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyRecorder")
            .field("graphs", &self.graphs)
            .field("open_graph", &self.open_graph)
            .field("methods_written", &self.methods_written)
            .finish_non_exhaustive()
    }
}

impl<'a, 'p, W: Write> DependencyRecorder<'a, 'p, W> {
    /// Start the document; nothing is written until the first record or `finish`
    pub fn new(factory: &'a MemberFactory<'p>, mut out: FlushingWriter<W>) -> Result<Self> {
        out.push_str(XML_PROLOG)?;
        out.push_str("<soyc-dependencies>\n")?;
        Ok(Self {
            factory,
            program: factory.program(),
            out,
            graphs: Vec::new(),
            open_graph: None,
            methods_written: 0,
        })
    }

    /// Open a named graph; `extends` must name a graph that is already written
    pub fn start_dependency_graph(&mut self, name: &str, extends: Option<&str>) -> Result<()> {
        if let Some(open) = &self.open_graph {
            bail!("Cannot start dependency graph '{name}' while '{open}' is still open");
        }
        if self.graphs.iter().any(|graph| graph == name) {
            bail!("Dependency graph '{name}' was already written");
        }

        write!(self.out, "<table name=\"{}\"", escape_attr(name))?;
        if let Some(extends) = extends {
            if !self.graphs.iter().any(|graph| graph == extends) {
                bail!("Dependency graph '{name}' extends unknown graph '{extends}'");
            }
            write!(self.out, " extends=\"{}\"", escape_attr(extends))?;
        }
        self.out.push_str(">\n")?;

        debug!("Recording dependency graph '{name}'");
        self.open_graph = Some(name.to_owned());
        Ok(())
    }

    pub fn end_dependency_graph(&mut self) -> Result<()> {
        let Some(name) = self.open_graph.take() else {
            bail!("No dependency graph is open");
        };
        self.out.push_str("</table>\n")?;
        self.graphs.push(name);
        Ok(())
    }

    /// Traverse from every entry in order, recording each newly live method
    pub fn record(
        &mut self,
        analyzer: &mut dyn Reachability,
        entries: &[MethodId],
    ) -> Result<()> {
        for &entry in entries {
            let name = self.program.readable_method_name(entry)?;
            trace!("Traversing from entry {name}");
            analyzer
                .traverse_from(entry, self)
                .with_context(|| format!("Dependency traversal from '{name}' failed"))?;
        }
        Ok(())
    }

    /// Number of `<method>` entries written so far
    pub fn methods_written(&self) -> usize {
        self.methods_written
    }

    /// Close the document and return the sink
    pub fn finish(mut self) -> Result<W> {
        if let Some(open) = &self.open_graph {
            bail!("Dependency graph '{open}' was never closed");
        }
        self.out.push_str("</soyc-dependencies>\n")?;
        debug!("Wrote {} dependency entries", self.methods_written);
        Ok(self.out.finish()?)
    }

    /// The member for `method` registered on its class, if it belongs to a type
    fn member_of(&self, method: MethodId) -> Result<Option<Arc<MethodMember>>> {
        if self.program.method_decl(method)?.enclosing_type.is_none() {
            return Ok(None);
        }
        let member = self.factory.method(method)?;
        if let Some(class) = member.enclosing() {
            class.add_method(Arc::clone(&member));
        }
        Ok(Some(member))
    }

    fn add_member_edges(&self, caller: MethodId, callee: MethodId) -> Result<()> {
        let Some(caller) = self.member_of(caller)? else {
            return Ok(());
        };
        let Some(callee) = self.member_of(callee)? else {
            return Ok(());
        };

        if let (Some(caller_class), Some(callee_class)) = (caller.enclosing(), callee.enclosing())
            && !Arc::ptr_eq(&caller_class, &callee_class)
        {
            caller_class.add_dependency(Member::Class(callee_class));
        }
        caller.add_dependency(Member::Method(callee));
        Ok(())
    }
}

impl<W: Write> LivenessSink for DependencyRecorder<'_, '_, W> {
    fn method_is_live_because(&mut self, method: MethodId, chain: &[MethodId]) -> Result<()> {
        let name = self.program.readable_method_name(method)?;
        writeln!(self.out, "<method name=\"{}\">", escape_attr(&name))?;
        // The chain ends with the live method itself
        let callers = &chain[..chain.len().saturating_sub(1)];
        for &caller in callers.iter().rev() {
            let caller_name = self.program.readable_method_name(caller)?;
            writeln!(self.out, "<called by=\"{}\"/>", escape_attr(&caller_name))?;
        }
        self.out.push_str("</method>\n")?;
        self.methods_written += 1;

        if let Some(&caller) = callers.last() {
            self.add_member_edges(caller, method)?;
        }
        Ok(())
    }
}

/// Write the whole dependencies document for `program`
///
/// Without split points the live methods go straight under the root. With
/// split points an `initial` graph covers the entry methods, and each split
/// point gets an `sp<N>` graph extending it.
pub fn record_dependencies<W: Write>(
    factory: &MemberFactory<'_>,
    out: FlushingWriter<W>,
) -> Result<W> {
    let program = factory.program();
    let mut recorder = DependencyRecorder::new(factory, out)?;

    if program.split_points().is_empty() {
        let mut analyzer = CallGraphAnalyzer::new(program);
        recorder.record(&mut analyzer, program.entry_methods())?;
        return recorder.finish();
    }

    let mut initial = CallGraphAnalyzer::new(program);
    recorder.start_dependency_graph("initial", None)?;
    recorder.record(&mut initial, program.entry_methods())?;
    recorder.end_dependency_graph()?;
    let initial_live = initial.live_methods().clone();

    for split_point in program.split_points() {
        let mut analyzer = CallGraphAnalyzer::new(program).with_live(initial_live.iter().copied());
        recorder.start_dependency_graph(&format!("sp{}", split_point.id), Some("initial"))?;
        recorder.record(&mut analyzer, &split_point.entry_methods)?;
        recorder.end_dependency_graph()?;
    }

    recorder.finish()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::program::{MethodDecl, ProgramBuilder, TypeDecl};

    fn render(factory: &MemberFactory<'_>) -> String {
        let out = record_dependencies(factory, FlushingWriter::with_threshold(Vec::new(), 32))
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_chain_is_written_nearest_caller_first() {
        let mut builder = ProgramBuilder::new();
        let app = builder.add_type(TypeDecl::new("com.example.App"));
        let util = builder.add_type(TypeDecl::new("com.example.Util"));
        let main = builder.add_method(MethodDecl::new("main", Some(app)));
        let helper = builder.add_method(MethodDecl::new("helper", Some(app)));
        let target = builder.add_method(MethodDecl::new("target", Some(util)));
        builder.add_call(main, helper);
        builder.add_call(helper, target);
        builder.add_entry_method(main);
        let program = builder.build().unwrap();
        let factory = MemberFactory::new(&program);

        assert_eq!(
            render(&factory),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <soyc-dependencies>\n\
             <method name=\"com.example.App::main\">\n\
             </method>\n\
             <method name=\"com.example.App::helper\">\n\
             <called by=\"com.example.App::main\"/>\n\
             </method>\n\
             <method name=\"com.example.Util::target\">\n\
             <called by=\"com.example.App::helper\"/>\n\
             <called by=\"com.example.App::main\"/>\n\
             </method>\n\
             </soyc-dependencies>\n"
        );
    }

    #[test]
    fn test_member_edges_are_recorded() {
        let mut builder = ProgramBuilder::new();
        let app = builder.add_type(TypeDecl::new("App"));
        let util = builder.add_type(TypeDecl::new("Util"));
        let main = builder.add_method(MethodDecl::new("main", Some(app)));
        let run = builder.add_method(MethodDecl::new("run", Some(app)));
        let log = builder.add_method(MethodDecl::new("log", Some(util)));
        builder.add_call(main, run);
        builder.add_call(run, log);
        builder.add_entry_method(main);
        let program = builder.build().unwrap();
        let factory = MemberFactory::new(&program);
        render(&factory);

        let main_member = factory.method(main).unwrap();
        let deps: Vec<_> = main_member
            .dependencies()
            .iter()
            .map(|m| m.source_name().to_owned())
            .collect();
        assert_eq!(deps, vec!["App::run()V"]);

        let app_class = factory.class(app).unwrap();
        let deps: Vec<_> = app_class
            .dependencies()
            .iter()
            .map(|m| m.source_name().to_owned())
            .collect();
        assert_eq!(deps, vec!["Util"]);
        assert!(factory.class(util).unwrap().dependencies().is_empty());
    }

    #[test]
    fn test_global_functions_are_named_without_type() {
        let mut builder = ProgramBuilder::new();
        let ty = builder.add_type(TypeDecl::new("A"));
        let init = builder.add_method(MethodDecl::new("$init", None));
        let run = builder.add_method(MethodDecl::new("run", Some(ty)));
        builder.add_call(init, run);
        builder.add_entry_method(init);
        let program = builder.build().unwrap();
        let factory = MemberFactory::new(&program);

        let doc = render(&factory);
        assert!(doc.contains("<method name=\"$init\">\n</method>\n"));
        assert!(doc.contains("<method name=\"A::run\">\n<called by=\"$init\"/>\n</method>\n"));
        // No edges start at a global function
        assert_eq!(factory.method_count(), 0);
    }

    #[test]
    fn test_split_points_produce_named_graphs() {
        let mut builder = ProgramBuilder::new();
        let ty = builder.add_type(TypeDecl::new("A"));
        let main = builder.add_method(MethodDecl::new("main", Some(ty)));
        let shared = builder.add_method(MethodDecl::new("shared", Some(ty)));
        let lazy = builder.add_method(MethodDecl::new("lazy", Some(ty)));
        builder.add_call(main, shared);
        builder.add_call(lazy, shared);
        builder.add_entry_method(main);
        builder.add_split_point(1, "A.onClick", [lazy]);
        let program = builder.build().unwrap();
        let factory = MemberFactory::new(&program);

        insta::assert_snapshot!(render(&factory), @r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <soyc-dependencies>
        <table name="initial">
        <method name="A::main">
        </method>
        <method name="A::shared">
        <called by="A::main"/>
        </method>
        </table>
        <table name="sp1" extends="initial">
        <method name="A::lazy">
        </method>
        </table>
        </soyc-dependencies>
        "#);
    }

    #[test]
    fn test_graph_must_extend_written_graph() {
        let program = ProgramBuilder::new().build().unwrap();
        let factory = MemberFactory::new(&program);
        let mut recorder = DependencyRecorder::new(&factory, FlushingWriter::new(Vec::new())).unwrap();

        let err = recorder
            .start_dependency_graph("sp1", Some("initial"))
            .unwrap_err();
        assert!(err.to_string().contains("unknown graph 'initial'"));

        recorder.start_dependency_graph("initial", None).unwrap();
        assert!(recorder.start_dependency_graph("sp1", None).is_err());
        recorder.end_dependency_graph().unwrap();
        recorder
            .start_dependency_graph("sp1", Some("initial"))
            .unwrap();
        recorder.end_dependency_graph().unwrap();
        assert!(recorder.end_dependency_graph().is_err());
        recorder.finish().unwrap();
    }

    #[test]
    fn test_unclosed_graph_fails_finish() {
        let program = ProgramBuilder::new().build().unwrap();
        let factory = MemberFactory::new(&program);
        let mut recorder = DependencyRecorder::new(&factory, FlushingWriter::new(Vec::new())).unwrap();
        recorder.start_dependency_graph("initial", None).unwrap();
        assert!(recorder.finish().is_err());
    }

    #[test]
    fn test_names_are_escaped() {
        let mut builder = ProgramBuilder::new();
        let ty = builder.add_type(TypeDecl::new("Outer<T>"));
        let main = builder.add_method(MethodDecl::new("a&b", Some(ty)));
        builder.add_entry_method(main);
        let program = builder.build().unwrap();
        let factory = MemberFactory::new(&program);

        assert!(render(&factory).contains("<method name=\"Outer&lt;T&gt;::a&amp;b\">"));
    }
}
