use super::{LanguagePlan, argv};

/// Node reads stdin itself; `--check` stands in for compilation.
pub(super) fn plan() -> LanguagePlan {
    LanguagePlan {
        source_file: "solution.js",
        syntax_check: None,
        compile: Some(argv(&["node", "--check", "solution.js"])),
        run: argv(&["node", "solution.js"]),
        support_files: vec![],
        build_dir: None,
    }
}
