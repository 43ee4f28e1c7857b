mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use magicscript::builtins::register_builtins;
use magicscript::interpreter::{ExecutionContext, Interpreter};
use magicscript::logging::LogSink;
use magicscript::{analysis, lexer, parser};

fn bench_pipeline(c: &mut Criterion) {
    for (label, path) in common::WORKLOADS {
        let source = common::load_source(path);
        let program = common::load_program(path);

        c.bench_function(&format!("frontend_tokenize_{label}"), |b| {
            b.iter(|| {
                black_box(lexer::tokenize(black_box(&source)));
            })
        });

        c.bench_function(&format!("frontend_parse_{label}"), |b| {
            b.iter(|| {
                let tokens = lexer::tokenize(black_box(&source));
                black_box(parser::parse_tokens(tokens).expect("parse"));
            })
        });

        c.bench_function(&format!("static_analysis_{label}"), |b| {
            b.iter(|| {
                black_box(analysis::analyze_program(black_box(&program)));
            })
        });

        c.bench_function(&format!("execute_and_call_main_{label}"), |b| {
            b.iter(|| {
                let logs = LogSink::new();
                let mut interpreter = Interpreter::new(logs.clone());
                register_builtins(interpreter.global_env(), &logs);
                let ctx = ExecutionContext::default();
                interpreter.execute_program(&program, &ctx);
                black_box(interpreter.call_function_by_name("main", Vec::new(), &ctx));
            })
        });

        c.bench_function(&format!("full_pipeline_{label}"), |b| {
            b.iter(|| {
                let tokens = lexer::tokenize(black_box(&source));
                let parsed = parser::parse_tokens(tokens).expect("parse");
                let logs = LogSink::new();
                let mut interpreter = Interpreter::new(logs.clone());
                register_builtins(interpreter.global_env(), &logs);
                let ctx = ExecutionContext::default();
                interpreter.execute_program(&parsed, &ctx);
                black_box(interpreter.call_function_by_name("main", Vec::new(), &ctx));
            })
        });
    }
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
