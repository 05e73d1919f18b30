use super::{LanguagePlan, SupportFile, argv};

/// Calls `solution()` when `solution.py` defines one, otherwise runs it as a script.
const ENTRY_SCRIPT: &str = include_str!("../../../assets/python_entry.py");

pub(super) fn plan() -> LanguagePlan {
    LanguagePlan {
        source_file: "solution.py",
        syntax_check: Some("solution.py".into()),
        compile: None,
        run: argv(&["python3", "-u", "/workspace/entry.py"]),
        support_files: vec![SupportFile {
            name: "entry.py",
            contents: ENTRY_SCRIPT,
        }],
        build_dir: None,
    }
}
