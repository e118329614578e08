//! JSON compile snapshots consumed by the `soyc` binary
//!
//! A snapshot is what a compiler hands over for one permutation: the program
//! graph, provenance records and the emitted fragments. Declarations refer to
//! each other by their index in the corresponding list.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::{
    compile_output::{CompileOutput, Fragment, JsName, NameIndex, SizeBreakdown},
    program::{
        Correlation, FieldDecl, FieldId, MethodDecl, MethodId, Mutation, Origin, Program,
        ProgramBuilder, Range, SourceInfo, SourceInfoId, TypeDecl, TypeId,
    },
};

/// A loaded snapshot, ready for the report pipeline
#[derive(Debug)]
pub struct Snapshot {
    pub program: Program,
    pub compile: CompileOutput,
    /// Property bindings of each permutation folded into this compile
    pub permutations: Vec<Vec<(String, String)>>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid snapshot {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(content).context("Failed to parse snapshot JSON")?;
        raw.into_snapshot()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSnapshot {
    #[serde(default)]
    types: Vec<RawType>,
    #[serde(default)]
    methods: Vec<RawMethod>,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    source_infos: Vec<RawSourceInfo>,
    #[serde(default)]
    entry_methods: Vec<u32>,
    #[serde(default)]
    split_points: Vec<RawSplitPoint>,
    #[serde(default)]
    initial_load_sequence: Vec<u32>,
    #[serde(default)]
    fragments: Vec<RawFragment>,
    #[serde(default)]
    names: RawNames,
    #[serde(default)]
    permutations: Vec<IndexMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawType {
    name: String,
    superclass: Option<u32>,
    #[serde(default)]
    interfaces: Vec<u32>,
    js_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMethod {
    name: String,
    enclosing_type: Option<u32>,
    #[serde(default)]
    params: Vec<String>,
    returns: Option<String>,
    #[serde(default)]
    overrides: Vec<u32>,
    js_name: Option<String>,
    #[serde(default)]
    js_aliases: Vec<String>,
    /// Methods referenced from this method's body
    #[serde(default)]
    calls: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    name: String,
    enclosing_type: u32,
    js_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOrigin {
    location: String,
    line: u32,
}

impl From<RawOrigin> for Origin {
    fn from(raw: RawOrigin) -> Self {
        Self::new(raw.location, raw.line)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawCorrelation {
    Class(u32),
    Field(u32),
    Method(u32),
    Function(String),
    Literal(String),
    Origin(RawOrigin),
}

impl From<RawCorrelation> for Correlation {
    fn from(raw: RawCorrelation) -> Self {
        match raw {
            RawCorrelation::Class(id) => Self::Class(TypeId::new(id)),
            RawCorrelation::Field(id) => Self::Field(FieldId::new(id)),
            RawCorrelation::Method(id) => Self::Method(MethodId::new(id)),
            RawCorrelation::Function(name) => Self::Function(name),
            RawCorrelation::Literal(description) => Self::Literal(description),
            RawCorrelation::Origin(origin) => Self::Origin(origin.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMutation {
    description: String,
    caller: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSourceInfo {
    origin: Option<RawOrigin>,
    #[serde(default)]
    correlations: Vec<RawCorrelation>,
    #[serde(default)]
    mutations: Vec<RawMutation>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSplitPoint {
    id: u32,
    location: String,
    #[serde(default)]
    entry_methods: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRange {
    start: usize,
    end: usize,
    info: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSize {
    ident: String,
    short_ident: Option<String>,
    size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFragment {
    #[serde(default)]
    js: String,
    #[serde(default)]
    ranges: Vec<RawRange>,
    /// Total size; the length of `js` when absent
    size: Option<usize>,
    #[serde(default)]
    sizes: Vec<RawSize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawNames {
    methods: IndexMap<String, u32>,
    types: IndexMap<String, u32>,
    string_literals: IndexMap<String, String>,
}

impl RawSnapshot {
    fn into_snapshot(self) -> Result<Snapshot> {
        let mut builder = ProgramBuilder::new();

        for raw in self.types {
            let mut decl = TypeDecl::new(raw.name);
            decl.superclass = raw.superclass.map(TypeId::new);
            decl.interfaces = raw.interfaces.into_iter().map(TypeId::new).collect();
            decl.js_name = raw.js_name;
            builder.add_type(decl);
        }

        let mut calls = Vec::new();
        for raw in self.methods {
            let mut decl = MethodDecl::new(raw.name, raw.enclosing_type.map(TypeId::new))
                .params(raw.params);
            if let Some(returns) = raw.returns {
                decl = decl.returns(returns);
            }
            decl.overrides = raw.overrides.into_iter().map(MethodId::new).collect();
            decl.js_name = raw.js_name;
            decl.js_aliases = raw.js_aliases;
            let caller = builder.add_method(decl);
            calls.extend(raw.calls.into_iter().map(|callee| (caller, MethodId::new(callee))));
        }
        for (caller, callee) in calls {
            builder.add_call(caller, callee);
        }

        for raw in self.fields {
            let mut decl = FieldDecl::new(raw.name, TypeId::new(raw.enclosing_type));
            decl.js_name = raw.js_name;
            builder.add_field(decl);
        }

        let source_info_count = self.source_infos.len();
        for raw in self.source_infos {
            builder.add_source_info(SourceInfo {
                origin: raw.origin.map(Origin::from),
                correlations: raw.correlations.into_iter().map(Correlation::from).collect(),
                mutations: raw
                    .mutations
                    .into_iter()
                    .map(|m| Mutation {
                        description: m.description,
                        caller: m.caller,
                    })
                    .collect(),
            });
        }

        for entry in self.entry_methods {
            builder.add_entry_method(MethodId::new(entry));
        }
        for raw in self.split_points {
            builder.add_split_point(
                raw.id,
                raw.location,
                raw.entry_methods.into_iter().map(MethodId::new),
            );
        }
        for id in self.initial_load_sequence {
            builder.push_initial_load(id);
        }

        let program = builder.build()?;

        let mut names = NameIndex::new();
        for (ident, method) in self.names.methods {
            let method = MethodId::new(method);
            program
                .method_decl(method)
                .with_context(|| format!("Emitted name '{ident}' maps to an unknown method"))?;
            names.map_method(ident, method);
        }
        for (ident, ty) in self.names.types {
            let ty = TypeId::new(ty);
            program
                .type_decl(ty)
                .with_context(|| format!("Emitted name '{ident}' maps to an unknown type"))?;
            names.map_type(ident, ty);
        }
        for (ident, value) in self.names.string_literals {
            names.map_string_literal(ident, value);
        }

        let mut fragments = Vec::with_capacity(self.fragments.len());
        for (idx, raw) in self.fragments.into_iter().enumerate() {
            let mut ranges = Vec::with_capacity(raw.ranges.len());
            for range in raw.ranges {
                if range.start > range.end {
                    bail!(
                        "Fragment {idx}: range starts at {} after its end {}",
                        range.start,
                        range.end
                    );
                }
                if range.info as usize >= source_info_count {
                    bail!("Fragment {idx}: range refers to unknown source info {}", range.info);
                }
                ranges.push((Range::new(range.start, range.end), SourceInfoId::new(range.info)));
            }

            let mut sizes = SizeBreakdown {
                size: raw.size.unwrap_or(raw.js.len()),
                sizes: IndexMap::with_capacity(raw.sizes.len()),
            };
            for size in raw.sizes {
                let short_ident = size.short_ident.unwrap_or_else(|| size.ident.clone());
                sizes
                    .sizes
                    .insert(JsName::new(size.ident, short_ident), size.size);
            }

            fragments.push(Fragment {
                js: raw.js,
                ranges,
                sizes,
            });
        }

        debug!(
            "Loaded snapshot with {} fragments and {} permutations",
            fragments.len(),
            self.permutations.len()
        );
        Ok(Snapshot {
            program,
            compile: CompileOutput { fragments, names },
            permutations: self
                .permutations
                .into_iter()
                .map(|properties| properties.into_iter().collect())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_output::NameTarget;

    const SNAPSHOT: &str = r#"{
        "types": [
            { "name": "java.lang.Object" },
            { "name": "com.example.App", "superclass": 0, "js_name": "App" }
        ],
        "methods": [
            { "name": "main", "enclosing_type": 1, "params": ["[Ljava/lang/String;"], "calls": [1] },
            { "name": "run", "enclosing_type": 1, "returns": "I", "js_aliases": ["r"] }
        ],
        "fields": [{ "name": "count", "enclosing_type": 1 }],
        "source_infos": [
            { "origin": { "location": "App.java", "line": 1 }, "correlations": [{ "class": 1 }] },
            {
                "correlations": [{ "method": 1 }, { "literal": "int" }],
                "mutations": [{ "description": "Inlined", "caller": "MethodInliner" }]
            }
        ],
        "entry_methods": [0],
        "split_points": [{ "id": 1, "location": "App.main()", "entry_methods": [1] }],
        "initial_load_sequence": [1],
        "fragments": [
            {
                "js": "function run(){return 1}",
                "ranges": [{ "start": 0, "end": 24, "info": 0 }, { "start": 0, "end": 23, "info": 1 }],
                "sizes": [{ "ident": "App.run", "short_ident": "a", "size": 24 }]
            }
        ],
        "names": { "methods": { "App.run": 1 }, "types": { "App": 1 } },
        "permutations": [{ "user.agent": "safari", "locale": "en" }]
    }"#;

    #[test]
    fn test_snapshot_round_trip_into_program() {
        let snapshot = Snapshot::from_json(SNAPSHOT).unwrap();
        let program = &snapshot.program;

        assert_eq!(program.type_count(), 2);
        assert_eq!(
            program.method_signature(MethodId::new(0)).unwrap(),
            "com.example.App::main([Ljava/lang/String;)V"
        );
        assert_eq!(
            program.method_signature(MethodId::new(1)).unwrap(),
            "com.example.App::run()I"
        );
        assert_eq!(program.callees(MethodId::new(0)), vec![MethodId::new(1)]);
        assert_eq!(program.split_points()[0].entry_methods, vec![MethodId::new(1)]);

        let fragment = &snapshot.compile.fragments[0];
        assert_eq!(fragment.sizes.size, 24);
        assert_eq!(fragment.ranges[1].0, Range::new(0, 23));
        assert_eq!(
            snapshot
                .compile
                .names
                .target(&JsName::new("App.run", "a")),
            Some(NameTarget::Method(MethodId::new(1)))
        );
        assert_eq!(
            snapshot.permutations,
            vec![vec![
                ("user.agent".to_owned(), "safari".to_owned()),
                ("locale".to_owned(), "en".to_owned()),
            ]]
        );
    }

    #[test]
    fn test_dangling_reference_is_an_error() {
        let err = Snapshot::from_json(r#"{ "types": [{ "name": "A", "superclass": 4 }] }"#)
            .unwrap_err();
        assert!(format!("{err:#}").contains("undeclared type"), "{err:#}");
    }

    #[test]
    fn test_unknown_source_info_in_range_is_an_error() {
        let err = Snapshot::from_json(
            r#"{ "fragments": [{ "js": "x", "ranges": [{ "start": 0, "end": 1, "info": 0 }] }] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown source info 0"), "{err}");
    }

    #[test]
    fn test_inverted_range_is_an_error() {
        let err = Snapshot::from_json(
            r#"{
                "source_infos": [{}],
                "fragments": [{ "js": "abc", "ranges": [{ "start": 2, "end": 1, "info": 0 }] }]
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("after its end"), "{err}");
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        assert!(Snapshot::from_json(r#"{ "typse": [] }"#).is_err());
    }
}
