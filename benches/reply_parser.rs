use criterion::{black_box, criterion_group, criterion_main, Criterion};
use omcproxy::lexer::Lexer;
use omcproxy::parser::{parse_expression, split_list, strip_braces};

/// Benchmark tokenization of typical reply shapes
fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    group.bench_function("tokenize_class_list", |b| {
        b.iter(|| {
            let tokens = Lexer::tokenize(black_box("{Modelica,ModelicaReference,Complex}"));
            black_box(tokens)
        });
    });

    group.bench_function("tokenize_class_information", |b| {
        b.iter(|| {
            let tokens = Lexer::tokenize(black_box(
                "(\"model\",\"comment\",false,false,false,\"/work/Circuit.mo\",false,1,1,12,9)",
            ));
            black_box(tokens)
        });
    });

    group.finish();
}

/// Benchmark full expression parsing against reply sizes
fn bench_parse_expression(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_expression");

    let small = "{a,b,c}";
    let record = "record SimulationResult resultFile = \"res.mat\", messages = \"\", timeTotal = 1.25 end SimulationResult;";
    let large: String = {
        let names: Vec<String> = (0..500).map(|i| format!("Modelica.Blocks.C{}", i)).collect();
        format!("{{{}}}", names.join(","))
    };

    group.bench_function("small_list", |b| {
        b.iter(|| black_box(parse_expression(black_box(small))))
    });
    group.bench_function("simulation_record", |b| {
        b.iter(|| black_box(parse_expression(black_box(record))))
    });
    group.bench_function("large_class_list", |b| {
        b.iter(|| black_box(parse_expression(black_box(&large))))
    });

    group.finish();
}

/// Benchmark the split helpers on a wide component reply
fn bench_split_helpers(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");

    let components: String = {
        let chunks: Vec<String> = (0..100)
            .map(|i| {
                format!(
                    "{{A.R{i},r{i},\"comment {i}\",\"public\",false,false,false,false,\"parameter\",\"none\",\"unspecified\",{{}}}}"
                )
            })
            .collect();
        format!("{{{}}}", chunks.join(","))
    };

    group.bench_function("split_component_arrays", |b| {
        b.iter(|| black_box(split_list(strip_braces(black_box(&components)))))
    });

    group.finish();
}

criterion_group!(benches, bench_lexer, bench_parse_expression, bench_split_helpers);
criterion_main!(benches);
