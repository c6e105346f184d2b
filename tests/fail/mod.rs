use std::ffi::OsStr;

use mcx::ir::diagnostic::{DiagnosticKind, Severity};

use crate::common::{elaborate_file, programs};

/// Whether a diagnostic is the one a program under `tests/fail/programs` is expected to produce.
fn is_expected(program: &str, kind: &DiagnosticKind) -> bool {
	use DiagnosticKind as D;
	match program {
		"already_used" => matches!(kind, D::AlreadyUsed(_)),
		"arity" | "literal_arity" => matches!(kind, D::ArityMismatch { .. }),
		"dependency" | "mismatch" | "point" | "union" | "escaping_meta" | "siblings" =>
			matches!(kind, D::TypeMismatch { .. }),
		"not_exhaustive" | "static_not_exhaustive" => matches!(kind, D::NotExhaustive),
		"phase" => matches!(kind, D::PhaseMismatch { .. }),
		"misplaced_quote" => matches!(kind, D::MisplacedQuote),
		"misplaced_splice" => matches!(kind, D::MisplacedSplice),
		"unknown_key" => matches!(kind, D::UnknownKey(_)),
		"unsolved" => matches!(kind, D::UnsolvedMeta(_)),
		_ => panic!("no expected diagnostic for `{program}`"),
	}
}

// Each of the three list elements is reported on its own.
fn expected_count(program: &str) -> usize {
	match program {
		"siblings" => 3,
		_ => 1,
	}
}

/// Ensures every program under `tests/fail/programs` is rejected by the elaborator with the expected diagnostic.
#[test]
fn run_fail_tests() {
	for path in programs("tests/fail/programs") {
		let (elaborated, ..) = elaborate_file(&path);
		let program = path.file_stem().and_then(OsStr::to_str).unwrap();
		assert!(!elaborated.failed.is_empty(), "{}", path.display());

		let found = elaborated
			.diagnostics
			.iter()
			.filter(|(_, diagnostic)| diagnostic.severity == Severity::Error && is_expected(program, &diagnostic.kind))
			.count();
		assert!(found >= expected_count(program), "{}: {:?}", path.display(), elaborated.diagnostics);
	}
}

#[test]
fn dependents_of_failed_definitions_fail_silently() {
	let (elaborated, interner, _) = elaborate_file("tests/fail/programs/dependency.mcx".as_ref());
	let dependent = interner.get("dependent").unwrap();
	assert!(elaborated.failed.iter().any(|location| location.name == dependent));
	assert!(elaborated.diagnostics.iter().all(|(location, _)| location.map(|location| location.name) != Some(dependent)));
}
