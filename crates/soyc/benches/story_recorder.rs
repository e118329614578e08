use std::{hint::black_box, io};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use soyc::{
    members::MemberFactory,
    program::{Correlation, MethodDecl, Program, ProgramBuilder, Range, SourceInfo, SourceInfoId, TypeDecl},
    recorders::StoryRecorder,
    writer::FlushingWriter,
};

/// A fragment of `methods` functions, each with a couple of nested statements
fn synthetic_fragment(methods: usize) -> (Program, String, Vec<(Range, SourceInfoId)>) {
    let mut builder = ProgramBuilder::new();
    let ty = builder.add_type(TypeDecl::new("bench.Generated"));
    let class_info = builder.add_source_info(
        SourceInfo::at("bench/Generated.java", 1).with_correlation(Correlation::Class(ty)),
    );

    let mut js = String::new();
    let mut ranges = Vec::new();
    for idx in 0..methods {
        let method = builder.add_method(MethodDecl::new(format!("m{idx}"), Some(ty)));
        let method_info = builder.add_source_info(
            SourceInfo::at("bench/Generated.java", idx as u32 + 2)
                .with_correlation(Correlation::Method(method)),
        );
        let literal_info = builder.add_source_info(
            SourceInfo::new().with_correlation(Correlation::Literal("string".to_owned())),
        );

        let start = js.len();
        js.push_str(&format!("function m{idx}(a){{var s="));
        let literal_start = js.len();
        js.push_str("\"<value>\"");
        let literal_end = js.len();
        js.push_str(";return s+a}\n");
        ranges.push((Range::new(start, js.len() - 1), method_info));
        ranges.push((Range::new(literal_start, literal_end), literal_info));
    }
    ranges.push((Range::new(0, js.len()), class_info));

    (builder.build().expect("synthetic program builds"), js, ranges)
}

fn bench_story_recorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("story_recorder");
    for methods in [100, 1_000, 10_000] {
        let (program, js, ranges) = synthetic_fragment(methods);
        group.bench_with_input(BenchmarkId::from_parameter(methods), &methods, |b, _| {
            b.iter(|| {
                let factory = MemberFactory::new(&program);
                let mut recorder =
                    StoryRecorder::new(&factory, FlushingWriter::new(io::sink())).unwrap();
                recorder
                    .record_fragment(0, black_box(&js), black_box(&ranges))
                    .unwrap();
                recorder.finish().unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_story_recorder);
criterion_main!(benches);
