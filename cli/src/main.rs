use std::process::ExitCode;

use bumpalo::Bump;
use clap::{Parser, ValueEnum};
use stackgen_core::{
    compiler::MethodBuilder,
    errors::CompileError,
    ir::{BinaryOp, CompareOp, NodeBuilder},
    types::{Type, TypeManager},
    writer::WriterOptions,
};

/// Stackgen - build sample routines and print their source and bytecode
#[derive(Parser, Debug)]
#[command(name = "stackgen")]
#[command(about = "Compile sample routines to stack-machine bytecode", long_about = None)]
struct Args {
    /// Which sample routine to build
    #[arg(long, value_enum, default_value_t = Sample::All)]
    sample: Sample,

    /// Print only the pseudo-source rendering
    #[arg(long)]
    source: bool,

    /// Print only the bytecode listing
    #[arg(long)]
    listing: bool,

    /// Spaces per indentation level in the source rendering
    #[arg(long, default_value_t = 4)]
    indent: usize,

    /// Log filter, e.g. `debug` (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Sample {
    All,
    Sum,
    Clamp,
    Area,
    Average,
}

type BuildFn = for<'a> fn(NodeBuilder<'a>) -> Result<MethodBuilder<'a>, CompileError>;

impl Sample {
    const EACH: [Sample; 4] = [Sample::Sum, Sample::Clamp, Sample::Area, Sample::Average];

    fn builder(self) -> Option<BuildFn> {
        match self {
            Sample::All => None,
            Sample::Sum => Some(sum),
            Sample::Clamp => Some(clamp),
            Sample::Area => Some(area),
            Sample::Average => Some(average),
        }
    }
}

/// `static i64 sum(i32[] values)`: loop over an array, widening each element.
fn sum<'a>(b: NodeBuilder<'a>) -> Result<MethodBuilder<'a>, CompileError> {
    let ints = b.types().array(Type::I32)?;
    let mut m = MethodBuilder::new_static(b, "sum", Type::I64);
    let values = b.load(m.param("values", ints)?);
    let total = m.declare_local("total", Type::I64)?;
    let i = m.declare_local("i", Type::I32)?;
    let (total_expr, i_expr) = (b.load(total), b.load(i));

    m.push(b.assign(total, b.i32(0))?);
    m.push(b.assign(i, b.i32(0))?);
    let cond = b.compare(CompareOp::Lt, i_expr, b.array_length(values)?)?;
    let element = b.load(b.element(values, i_expr)?);
    let body = [
        b.assign(total, b.binary(BinaryOp::Add, total_expr, element)?)?,
        b.assign(i, b.binary(BinaryOp::Add, i_expr, b.i32(1))?)?,
    ];
    m.push(b.while_loop(cond, &body)?);
    m.push(b.ret(Some(total_expr)));
    Ok(m)
}

/// `static i32 clamp(i32 v, i32 lo, i32 hi)`
fn clamp<'a>(b: NodeBuilder<'a>) -> Result<MethodBuilder<'a>, CompileError> {
    let mut m = MethodBuilder::new_static(b, "clamp", Type::I32);
    let v = b.load(m.param("v", Type::I32)?);
    let lo = b.load(m.param("lo", Type::I32)?);
    let hi = b.load(m.param("hi", Type::I32)?);

    let below = b.compare(CompareOp::Lt, v, lo)?;
    let above = b.compare(CompareOp::Gt, v, hi)?;
    m.push(b.if_else(below, &[b.ret(Some(lo))], &[])?);
    m.push(b.if_else(above, &[b.ret(Some(hi))], &[b.ret(Some(v))])?);
    Ok(m)
}

/// `static f64 area(Shape s)`: type test, downcast and field access.
fn area<'a>(b: NodeBuilder<'a>) -> Result<MethodBuilder<'a>, CompileError> {
    let types = b.types();
    let shape = types.declare_class("Shape", None, &[])?;
    let circle = types.declare_class("Circle", Some(shape), &[])?;
    let radius = types.declare_field(circle, "radius", Type::F64, false)?;

    let mut m = MethodBuilder::new_static(b, "area", Type::F64);
    let s = b.load(m.param("s", Type::Class(shape))?);
    let as_circle = b.cast(Type::Class(circle), s)?;
    let r = b.load(b.field(radius, Some(as_circle))?);
    let squared = b.binary(BinaryOp::Mul, r, r)?;

    m.push(b.if_else(
        b.instance_of(s, circle)?,
        &[b.ret(Some(b.binary(BinaryOp::Mul, b.f64(std::f64::consts::PI), squared)?))],
        &[],
    )?);
    m.push(b.ret(Some(b.i32(0))));
    Ok(m)
}

/// `static i32 average(i64 total, i32 count)`: promotion then checked narrowing.
fn average<'a>(b: NodeBuilder<'a>) -> Result<MethodBuilder<'a>, CompileError> {
    let mut m = MethodBuilder::new_static(b, "average", Type::I32);
    let total = b.load(m.param("total", Type::I64)?);
    let count = b.load(m.param("count", Type::I32)?);

    let empty = b.compare(CompareOp::Eq, count, b.i32(0))?;
    m.push(b.if_else(empty, &[b.ret(Some(b.i32(0)))], &[])?);
    let quotient = b.binary(BinaryOp::Div, total, count)?;
    m.push(b.ret(Some(b.cast(Type::I32, quotient)?)));
    Ok(m)
}

fn run(sample: Sample, args: &Args) -> Result<(), CompileError> {
    let arena = Bump::new();
    let types = TypeManager::new(&arena);
    let nodes = NodeBuilder::new(&arena, types);

    let Some(build) = sample.builder() else {
        return Ok(());
    };
    let method = build(nodes)?;

    let both = args.source == args.listing;
    if args.source || both {
        let options = WriterOptions {
            indent_width: args.indent,
        };
        println!("{}", method.to_source(options));
    }
    if args.listing || both {
        let compiled = method.compile()?;
        println!("{:?}", compiled.code);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging subscriber
    use tracing_subscriber::{EnvFilter, fmt};

    // --log-level wins over RUST_LOG; default to WARN if neither is set
    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn")),
    };
    let filter = match filter {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("invalid log filter: {e}");
            return ExitCode::FAILURE;
        }
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let samples: &[Sample] = match args.sample {
        Sample::All => &Sample::EACH,
        ref one => std::slice::from_ref(one),
    };

    let mut failed = false;
    for (i, &sample) in samples.iter().enumerate() {
        if i > 0 {
            println!();
        }
        tracing::debug!(?sample, "building sample");
        if let Err(e) = run(sample, &args) {
            eprintln!("error: {sample:?}: {e}");
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
