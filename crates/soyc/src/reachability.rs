//! Liveness traversal over the program call graph
//!
//! The dependency recorder does not walk the program itself; it asks a
//! [`Reachability`] implementation to traverse from each entry method and
//! listens for methods becoming live.

use anyhow::Result;
use log::trace;
use rustc_hash::FxHashSet;

use crate::program::{MethodId, Program};

/// Receives one callback per method the traversal proves live
pub trait LivenessSink {
    /// `chain` lists the calling methods entry first and ends with `method` itself
    fn method_is_live_because(&mut self, method: MethodId, chain: &[MethodId]) -> Result<()>;
}

/// Something that can prove methods live starting from an entry point
pub trait Reachability {
    /// Visit every method reachable from `entry` that is not live yet
    ///
    /// An error returned by the sink stops the traversal and is passed on.
    fn traverse_from(&mut self, entry: MethodId, sink: &mut dyn LivenessSink) -> Result<()>;
}

/// Depth-first liveness analysis over [`Program::callees`]
///
/// Methods stay live across calls to `traverse_from`, so each method is
/// reported at most once per analyzer.
#[derive(Debug)]
pub struct CallGraphAnalyzer<'p> {
    program: &'p Program,
    live: FxHashSet<MethodId>,
}

struct Frame {
    method: MethodId,
    callees: Vec<MethodId>,
    next: usize,
}

impl<'p> CallGraphAnalyzer<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            live: FxHashSet::default(),
        }
    }

    /// Treat `live` as already proven, e.g. everything in the graph being extended
    #[must_use]
    pub fn with_live(mut self, live: impl IntoIterator<Item = MethodId>) -> Self {
        self.live.extend(live);
        self
    }

    pub fn is_live(&self, method: MethodId) -> bool {
        self.live.contains(&method)
    }

    pub fn live_methods(&self) -> &FxHashSet<MethodId> {
        &self.live
    }

    fn enter(&mut self, method: MethodId, stack: &mut Vec<Frame>, chain: &mut Vec<MethodId>) {
        chain.push(method);
        stack.push(Frame {
            method,
            callees: self.program.callees(method),
            next: 0,
        });
    }
}

impl Reachability for CallGraphAnalyzer<'_> {
    fn traverse_from(&mut self, entry: MethodId, sink: &mut dyn LivenessSink) -> Result<()> {
        if !self.live.insert(entry) {
            trace!("Entry {entry:?} is already live");
            return Ok(());
        }

        let mut stack = Vec::new();
        let mut chain = Vec::new();
        self.enter(entry, &mut stack, &mut chain);
        sink.method_is_live_because(entry, &chain)?;

        while let Some(frame) = stack.last_mut() {
            let Some(&callee) = frame.callees.get(frame.next) else {
                trace!("Finished visiting {:?}", frame.method);
                stack.pop();
                chain.pop();
                continue;
            };
            frame.next += 1;

            if self.live.insert(callee) {
                self.enter(callee, &mut stack, &mut chain);
                sink.method_is_live_because(callee, &chain)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::program::{MethodDecl, ProgramBuilder};

    #[derive(Default)]
    struct Recording(Vec<Vec<MethodId>>);

    impl LivenessSink for Recording {
        fn method_is_live_because(&mut self, method: MethodId, chain: &[MethodId]) -> Result<()> {
            assert_eq!(chain.last(), Some(&method));
            self.0.push(chain.to_vec());
            Ok(())
        }
    }

    fn diamond() -> (Program, [MethodId; 4]) {
        let mut builder = ProgramBuilder::new();
        let main = builder.add_method(MethodDecl::new("main", None));
        let left = builder.add_method(MethodDecl::new("left", None));
        let right = builder.add_method(MethodDecl::new("right", None));
        let shared = builder.add_method(MethodDecl::new("shared", None));
        builder.add_call(main, left);
        builder.add_call(main, right);
        builder.add_call(left, shared);
        builder.add_call(right, shared);
        builder.add_call(shared, main);
        (builder.build().unwrap(), [main, left, right, shared])
    }

    #[test]
    fn test_depth_first_chains() {
        let (program, [main, left, right, shared]) = diamond();
        let mut analyzer = CallGraphAnalyzer::new(&program);
        let mut sink = Recording::default();
        analyzer.traverse_from(main, &mut sink).unwrap();

        assert_eq!(
            sink.0,
            vec![
                vec![main],
                vec![main, left],
                vec![main, left, shared],
                vec![main, right],
            ]
        );
        assert!(analyzer.is_live(shared));
        assert!(analyzer.is_live(right));
    }

    #[test]
    fn test_live_set_is_shared_across_entries() {
        let (program, [main, left, _, _]) = diamond();
        let mut analyzer = CallGraphAnalyzer::new(&program);
        let mut sink = Recording::default();
        analyzer.traverse_from(left, &mut sink).unwrap();
        let first = sink.0.len();
        analyzer.traverse_from(main, &mut sink).unwrap();

        // left -> shared -> main -> right; nothing is new from main afterwards
        assert_eq!(first, 4);
        assert_eq!(sink.0.len(), 4);
    }

    #[test]
    fn test_seeded_live_methods_are_skipped() {
        let (program, [main, left, right, shared]) = diamond();
        let mut analyzer = CallGraphAnalyzer::new(&program).with_live([left]);
        let mut sink = Recording::default();
        analyzer.traverse_from(main, &mut sink).unwrap();

        assert_eq!(
            sink.0,
            vec![vec![main], vec![main, right], vec![main, right, shared]]
        );
    }

    #[test]
    fn test_sink_error_stops_traversal() {
        struct Failing(usize);
        impl LivenessSink for Failing {
            fn method_is_live_because(&mut self, _: MethodId, _: &[MethodId]) -> Result<()> {
                self.0 += 1;
                if self.0 == 2 {
                    bail!("disk full");
                }
                Ok(())
            }
        }

        let (program, [main, ..]) = diamond();
        let mut analyzer = CallGraphAnalyzer::new(&program);
        let mut sink = Failing(0);
        let err = analyzer.traverse_from(main, &mut sink).unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(sink.0, 2);
    }
}
