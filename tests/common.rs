use std::{
	ffi::OsStr,
	fs,
	path::{Path, PathBuf},
	rc::Rc,
};

use lasso::Rodeo;
use mcx::{
	common::Name,
	ir::source::LexedSource,
	op::{
		elaborate::{elaborate, Elaborated},
		parse::parse,
		resolve::resolve,
	},
	report::report_diagnostic,
};

pub const EXTENSION: &str = "mcx";

pub fn elaborate_source(source: &str, module: &str) -> (Elaborated, Rodeo) {
	let lexed_source = LexedSource::new(source).ok().expect(module);
	let (parsed_module, mut interner) = parse(source, &lexed_source, Rodeo::new()).expect(module);
	let location: Rc<[Name]> = [interner.get_or_intern(module)].into();
	let resolved_module = resolve(parsed_module, location, &interner).expect(module);
	(elaborate(resolved_module, &[], None), interner)
}

pub fn elaborate_file(path: &Path) -> (Elaborated, Rodeo, String) {
	let path_str = path.as_os_str().to_str().unwrap().to_owned();
	let source = fs::read_to_string(path).expect(&path_str);
	let module = path.file_stem().and_then(OsStr::to_str).expect(&path_str);
	let (elaborated, interner) = elaborate_source(&source, module);
	(elaborated, interner, source)
}

pub fn pass_frontend(path: PathBuf) -> (Elaborated, Rodeo) {
	let (elaborated, interner, source) = elaborate_file(&path);
	if !elaborated.failed.is_empty() {
		for (_, diagnostic) in elaborated.diagnostics.iter() {
			report_diagnostic(&source, &interner, diagnostic);
		}
		panic!("{}", path.display());
	}
	(elaborated, interner)
}

pub fn programs(directory: impl AsRef<Path>) -> impl Iterator<Item = PathBuf> {
	fs::read_dir(directory)
		.unwrap()
		.flatten()
		.map(|x| x.path())
		.filter(|x| x.extension() == Some(OsStr::new(EXTENSION)))
}

pub fn pass_frontend_directory(directory: impl AsRef<Path>) {
	for path in programs(directory) {
		pass_frontend(path);
	}
}
