#![allow(dead_code)]
use std::fs;

use magicscript::ast::Program;
use magicscript::{lexer, parser};

pub const WORKLOADS: [(&str, &str); 2] = [
    ("sum_loop", "tests/programs/sum_loop/program.ms"),
    ("fib", "tests/programs/fib_recursion/program.ms"),
];

pub fn load_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

pub fn load_program(path: &str) -> Program {
    let source = load_source(path);
    let tokens = lexer::tokenize(&source);
    parser::parse_tokens(tokens).unwrap_or_else(|errors| panic!("parse {path}: {errors:?}"))
}
