use super::{LanguagePlan, argv};

/// Mono toolchain: `mcs` to compile, `mono` to run.
pub(super) fn plan() -> LanguagePlan {
    LanguagePlan {
        source_file: "Solution.cs",
        syntax_check: None,
        compile: Some(argv(&["mcs", "-out:build/solution.exe", "Solution.cs"])),
        run: argv(&["mono", "build/solution.exe"]),
        support_files: vec![],
        build_dir: Some("build"),
    }
}
