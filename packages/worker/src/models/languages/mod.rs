//! How each supported language is laid out in the workspace and driven by the harness.

mod csharp;
mod java;
mod javascript;
mod python;

use common::LanguageKind;

use crate::config::SandboxConfig;
use crate::entity::{language, test_case};
use crate::models::sandbox::harness::{HarnessConfig, HarnessTestCase};

/// Extra file written next to the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportFile {
    pub name: &'static str,
    pub contents: &'static str,
}

/// Workspace layout and commands for one language. Commands run with the
/// workspace as working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePlan {
    pub source_file: &'static str,
    /// File the harness syntax-checks in-process (Python only).
    pub syntax_check: Option<String>,
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
    pub support_files: Vec<SupportFile>,
    /// Writable output directory for compiled artifacts.
    pub build_dir: Option<&'static str>,
}

pub fn plan_for(kind: LanguageKind) -> LanguagePlan {
    match kind {
        LanguageKind::Python => python::plan(),
        LanguageKind::JavaScript => javascript::plan(),
        LanguageKind::Java => java::plan(),
        LanguageKind::CSharp => csharp::plan(),
    }
}

impl LanguagePlan {
    /// Apply the language row's command overrides. Blank overrides are ignored.
    pub fn with_overrides(mut self, language: &language::Model) -> Self {
        if let Some(run) = split_command(language.run_command.as_deref()) {
            self.run = run;
        }
        if let Some(compile) = split_command(language.compile_command.as_deref()) {
            self.compile = Some(compile);
        }
        self
    }

    pub fn harness_config(
        &self,
        language: &language::Model,
        test_cases: &[test_case::Model],
        sandbox: &SandboxConfig,
    ) -> HarnessConfig {
        HarnessConfig {
            time_limit_seconds: language.time_limit_seconds.max(1) as u64,
            compile_timeout_seconds: sandbox.harness_overhead_secs,
            syntax_check: self.syntax_check.clone(),
            compile: self.compile.clone(),
            run: self.run.clone(),
            run_as_uid: sandbox.untrusted_uid(),
            test_cases: test_cases
                .iter()
                .map(|tc| HarnessTestCase {
                    id: tc.id,
                    input: tc.input.clone(),
                })
                .collect(),
        }
    }
}

fn split_command(command: Option<&str>) -> Option<Vec<String>> {
    let parts: Vec<String> = command?.split_whitespace().map(str::to_string).collect();
    (!parts.is_empty()).then_some(parts)
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
