use clap::{Parser as ClapParser, ValueEnum};
use log::{debug, info};
use monkey_lang::compiler::Compiler;
use monkey_lang::config::{self, VmLimits};
use monkey_lang::env::Environment;
use monkey_lang::eval::eval_program;
use monkey_lang::highlighter::MonkeyHelper;
use monkey_lang::lexer::Lexer;
use monkey_lang::macros::{define_macros, expand_macros};
use monkey_lang::object::Object;
use monkey_lang::parser::Parser;
use monkey_lang::vm::VM;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::error::Error;
use std::fs;
use std::path::PathBuf;

/// The Monkey programming language
#[derive(ClapParser, Debug)]
#[command(name = "monkey")]
#[command(version = config::VERSION)]
#[command(about = "The Monkey programming language")]
#[command(long_about = "Tree-walking interpreter and bytecode VM for the Monkey language")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Evaluate with the tree-walking interpreter instead of the bytecode VM
    #[arg(long)]
    interpreter: bool,

    /// Print the disassembled bytecode before running (VM engine only)
    #[arg(long = "dump-bytecode")]
    dump_bytecode: bool,

    /// Specify the log level
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    verbosity: LogLevel,
}

/// Enum for specifying the log level.
#[derive(ValueEnum, Clone, Copy, Default, Debug)]
enum LogLevel {
    /// Only critical errors are logged.
    #[default]
    Error,
    /// Also log warnings.
    Warn,
    /// Log general progress, e.g. which file is being run.
    Info,
    /// Log internal details such as compiled bytecode listings.
    Debug,
    /// Log everything.
    Trace,
}

impl From<LogLevel> for log::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();
    simple_logger::init_with_level(args.verbosity.into())?;

    match &args.script {
        Some(path) => run_script(path, &args),
        None => repl(&args),
    }
}

/// Execute a Monkey script file. Scripts print through `puts`; the value of
/// the final statement is not echoed.
fn run_script(path: &PathBuf, args: &CliArgs) -> Result<(), Box<dyn Error>> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("cannot read script file {}: {}", path.display(), e))?;
    info!(
        "running {} with the {}",
        path.display(),
        if args.interpreter {
            "interpreter"
        } else {
            "bytecode VM"
        }
    );

    let mut parser = Parser::new(Lexer::new(&source));
    let mut program = parser.parse_program();
    if !parser.errors().is_empty() {
        for err in parser.errors() {
            eprintln!("\t{}", err);
        }
        return Err(format!("parsing failed with {} error(s)", parser.errors().len()).into());
    }

    if args.interpreter {
        let env = Environment::new();
        let macro_env = Environment::new();
        define_macros(&mut program, &macro_env);
        let expanded =
            expand_macros(program, &macro_env).map_err(|e| format!("macro expansion failed: {}", e))?;
        if let Object::Error(message) = eval_program(&expanded, &env) {
            return Err(message.into());
        }
    } else {
        let mut compiler = Compiler::new();
        compiler.compile(&program).map_err(|e| e.to_string())?;
        let bytecode = compiler.bytecode();
        debug!("compiled {} constant(s)", bytecode.constants.len());
        if args.dump_bytecode {
            print!("{}", bytecode.instructions);
        }
        let mut vm = VM::new(bytecode);
        vm.run().map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Interactive session. Definitions persist across lines: the value and
/// macro environments for the interpreter; the symbol table, constant pool,
/// and globals array for the VM.
fn repl(args: &CliArgs) -> Result<(), Box<dyn Error>> {
    let editor_config = Config::builder().auto_add_history(true).build();
    let mut rl = Editor::with_config(editor_config)
        .map_err(|e| format!("failed to initialize REPL: {}", e))?;
    rl.set_helper(Some(MonkeyHelper::new()));
    let _ = rl.load_history(config::HISTORY_FILE);

    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);

    let env = Environment::new();
    let macro_env = Environment::new();
    let (mut symbol_table, mut constants) = Compiler::new().into_state();
    let mut globals = vec![Object::Null; VmLimits::default().globals_size];

    loop {
        match rl.readline(config::PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                let mut parser = Parser::new(Lexer::new(&line));
                let mut program = parser.parse_program();
                if !parser.errors().is_empty() {
                    for err in parser.errors() {
                        println!("\t{}", err);
                    }
                    continue;
                }

                if args.interpreter {
                    define_macros(&mut program, &macro_env);
                    let expanded = match expand_macros(program, &macro_env) {
                        Ok(expanded) => expanded,
                        Err(message) => {
                            println!("ERROR: {}", message);
                            continue;
                        }
                    };
                    println!("{}", eval_program(&expanded, &env));
                } else {
                    let mut compiler = Compiler::with_state(
                        std::mem::take(&mut symbol_table),
                        std::mem::take(&mut constants),
                    );
                    let compiled = compiler.compile(&program);
                    let bytecode = compiler.bytecode();
                    (symbol_table, constants) = compiler.into_state();

                    if let Err(err) = compiled {
                        println!("Woops! Compilation failed:\n{}", err);
                        continue;
                    }
                    if args.dump_bytecode {
                        print!("{}", bytecode.instructions);
                    }

                    let mut vm = VM::with_globals(bytecode, std::mem::take(&mut globals));
                    match vm.run() {
                        Ok(()) => println!("{}", vm.last_popped()),
                        Err(err) => println!("Woops! Executing bytecode failed:\n{}", err),
                    }
                    globals = vm.into_globals();
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(config::HISTORY_FILE);
    Ok(())
}
