use anyhow::{Result, bail};
use tracing_subscriber::EnvFilter;

use magicscript::interpreter::{ExecutionContext, ExecutionMode};
use magicscript::runner::ScriptHost;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let mut root = ".".to_string();
    let mut entry = "main".to_string();
    let mut mode = ExecutionMode::Normal;
    let mut script_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--root" | "-r" => {
                root = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing directory after {arg}"))?;
            }
            "--entry" | "-e" => {
                entry = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing function name after {arg}"))?;
            }
            "--pre-analysis" => {
                mode = ExecutionMode::PreAnalysis;
            }
            _ => {
                script_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one script file is supported");
                }
                break;
            }
        }
    }

    let Some(script_path) = script_path else {
        bail!("Usage: magicscript [--root DIR] [--entry NAME] [--pre-analysis] <script.ms>");
    };

    let mut host = ScriptHost::new(root);
    let result = host.run_script_file(&script_path, &entry, &ExecutionContext { mode });

    for log in host.logs().entries() {
        println!("[{}] {}", log.severity, log.message);
    }

    let report = result?;
    println!(
        "{script_path}: {entry}() returned {} | peak space {} bytes | {}",
        report.return_value.to_debug_string(),
        report.peak_space_bytes,
        report.complexity
    );

    if report.aborted {
        bail!("execution aborted by a runtime error");
    }
    Ok(())
}
