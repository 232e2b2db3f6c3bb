// src/main.rs

use clap::{Parser, ValueEnum};
use shapescript::diagnostics::{DiagnosticBag, codes};
use shapescript::geom::{Shape, ShapeProgram, glsl_function_export};
use shapescript::program::Program;
use shapescript::reporter::CompilerError;
use shapescript::system::{Config, System};
use shapescript::utils::Source;
use std::fs;
use std::process;
use std::rc::Rc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// `dist` 和 `colour` 两个 GLSL 函数
    Glsl,
    /// 程序的值
    Value,
}

/// 一个把形状程序编译为 GLSL 的编译器
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 需要编译的源文件路径
    #[arg(required_unless_present = "explain")]
    input_file: Option<String>,

    /// 输出文件的路径。不提供时写到标准输出
    #[arg(short, long)]
    output_file: Option<String>,

    /// 输出什么
    #[arg(long, value_enum, default_value_t = Emit::Glsl)]
    emit: Emit,

    /// 解释执行时的最大调用深度
    #[arg(long, default_value_t = Config::default().max_call_depth)]
    max_depth: usize,

    /// 解释一个错误码，例如 E0305
    #[arg(long, value_name = "CODE")]
    explain: Option<String>,
}

fn explain(code: &str) -> i32 {
    match codes::lookup(code) {
        Some(error_code) => {
            println!("{}: {}\n\n{}", error_code.code, error_code.message, error_code.explanation);
            0
        }
        None => {
            eprintln!("error: unknown error code '{}'", code);
            1
        }
    }
}

/// 打印所有错误并以失败状态退出。
fn fail(source: &Rc<Source>, errors: &[CompilerError]) -> ! {
    let mut diagnostics = DiagnosticBag::new(source.clone());
    diagnostics.report_all(errors);
    if let Err(e) = diagnostics.print() {
        eprintln!("error: failed to print diagnostics: {}", e);
    }
    process::exit(1);
}

fn run(cli: &Cli, input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read file '{}': {}", input, e))?;
    let source = Source::new(input, text);
    let system = System::new(Config {
        max_call_depth: cli.max_depth,
    });

    // 1. 编译
    let mut program = Program::new(source.clone(), system);
    if let Err(errors) = program.compile(None, None) {
        fail(&source, &errors);
    }

    // 2. 求值
    let value = match program.eval() {
        Ok(value) => value,
        Err(e) => fail(&source, &[e.into()]),
    };

    // 3. 输出
    let output = match cli.emit {
        Emit::Value => format!("{}\n", value),
        Emit::Glsl => {
            let mut shape = ShapeProgram::new(&program);
            if let Err(e) = shape.require_shape(&value) {
                fail(&source, &[e.into()]);
            }
            debug!(is_2d = shape.is_2d(), is_3d = shape.is_3d(), bbox = ?shape.bbox(), "shape");
            let mut glsl = String::new();
            if let Err(e) = glsl_function_export(&shape, &mut glsl) {
                fail(&source, &[e.into()]);
            }
            glsl
        }
    };

    match &cli.output_file {
        Some(path) => {
            fs::write(path, output)?;
            info!("wrote '{}'", path);
        }
        None => print!("{}", output),
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shapescript=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(code) = &cli.explain {
        process::exit(explain(code));
    }
    let Some(input) = &cli.input_file else {
        eprintln!("error: no input file");
        process::exit(2);
    };

    if let Err(e) = run(&cli, input) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
