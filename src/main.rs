use std::{path::Path, rc::Rc};

use bpaf::{construct, long, short, Parser};
use lasso::Rodeo;
use mcx::{
	common::{Name, Range},
	ir::source::LexedSource,
	op::{
		elaborate::{elaborate, Instruction},
		parse::parse,
		resolve::resolve,
		unparse::print_definition,
	},
	report::{report_diagnostic, report_lex_error, report_parse_error, report_resolve_error},
};

/// Checks a single module, returning whether every definition elaborated without errors.
pub fn run(source: &str, module: &str, instruction: Option<Instruction>, quiet: bool) -> bool {
	// Parsing.
	let lexed_source = match LexedSource::new(source) {
		Ok(x) => x,
		Err(e) => {
			report_lex_error(source, e);
			return false;
		}
	};

	let (parsed_module, mut interner) = match parse(source, &lexed_source, Rodeo::new()) {
		Ok(x) => x,
		Err(e) => {
			report_parse_error(source, &lexed_source, e);
			return false;
		}
	};
	println!("Parsing complete.");

	let location: Rc<[Name]> = [interner.get_or_intern(module)].into();
	let resolved_module = match resolve(parsed_module, location, &interner) {
		Ok(x) => x,
		Err(e) => {
			report_resolve_error(source, &interner, e);
			return false;
		}
	};
	println!("Resolution complete.");

	println!();

	// Elaboration.
	let elaborated = elaborate(resolved_module, &[], instruction);
	for (_, diagnostic) in elaborated.diagnostics.iter() {
		report_diagnostic(source, &interner, diagnostic);
	}
	println!("Elaboration complete.");

	if !quiet {
		for definition in &elaborated.module.definitions {
			let mut string = String::new();
			// Writing to a string never fails.
			let _ = print_definition(definition, &mut string, &interner);
			println!("{string}");
		}
	}

	if let Some(hover) = &elaborated.hover {
		println!();
		println!("Hover [{}, {}):", hover.range.start, hover.range.end);
		println!("{}", hover.markdown(&interner));
	}
	for hint in &elaborated.inlay_hints {
		println!("Inlay hint at {}: {}", hint.position, hint.label);
	}

	elaborated.failed.is_empty() && !elaborated.diagnostics.has_errors(None)
}

enum InputOption {
	Direct(String),
	FilePath(String),
}

struct Options {
	input: InputOption,
	hover: Option<usize>,
	inlay: Option<Range>,
	quiet: bool,
}

fn parse_range(string: String) -> Result<Range, String> {
	let (start, end) = string.split_once(':').ok_or("expected START:END")?;
	let start = start.parse::<usize>().map_err(|e| e.to_string())?;
	let end = end.parse::<usize>().map_err(|e| e.to_string())?;
	Ok(Range::new(start, end))
}

fn main() {
	let direct = short('c').argument::<String>("\"module\"").help("Read input from argument").map(InputOption::Direct);
	let file_path = short('f').argument::<String>("PATH").help("Read input from file").map(InputOption::FilePath);
	let input = construct!([direct, file_path]);
	let hover = long("hover").argument::<usize>("OFFSET").help("Report the type at a byte offset").optional();
	let inlay = long("inlay")
		.argument::<String>("START:END")
		.help("Report implicit quotes and splices in a byte range")
		.parse(parse_range)
		.optional();
	let quiet = short('q').long("quiet").help("Do not print elaborated definitions").switch();
	let options: Options = construct!(Options { input, hover, inlay, quiet }).to_options().run();

	let (input, module) = match options.input {
		InputOption::Direct(source) => (source, "main".to_owned()),
		InputOption::FilePath(file_path) => {
			let module = Path::new(&file_path)
				.file_stem()
				.and_then(|stem| stem.to_str())
				.unwrap_or("main")
				.to_owned();
			match std::fs::read_to_string(&file_path) {
				Ok(source) => (source, module),
				Err(e) => {
					eprintln!("error: could not read {file_path}: {e}");
					std::process::exit(2);
				}
			}
		}
	};

	let instruction = match (options.hover, options.inlay) {
		(Some(position), _) => Some(Instruction::Hover(position)),
		(None, Some(range)) => Some(Instruction::Inlay(range)),
		(None, None) => None,
	};

	if !run(&input, &module, instruction, options.quiet) {
		std::process::exit(1);
	}
}
