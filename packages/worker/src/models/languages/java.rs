use super::{LanguagePlan, argv};

pub(super) fn plan() -> LanguagePlan {
    LanguagePlan {
        source_file: "Main.java",
        syntax_check: None,
        compile: Some(argv(&["javac", "-d", "build", "Main.java"])),
        run: argv(&["java", "-cp", "build", "Main"]),
        support_files: vec![],
        build_dir: Some("build"),
    }
}
