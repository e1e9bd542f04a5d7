use std::path::Path;

use async_trait::async_trait;
use regex::Regex;

use crate::check::{CheckCategory, CheckOutcome, CheckSpec, Effort, Finding, QualityCheck, Severity};
use crate::context::ChangeContext;
use crate::error::GateResult;

/// Rust file naming and file length.
#[derive(Debug)]
pub struct StructureCheck {
    spec: CheckSpec,
    max_file_lines: usize,
    snake_case: Regex,
}

impl StructureCheck {
    pub const ID: &'static str = "structure";

    pub fn new(max_file_lines: usize) -> GateResult<Self> {
        Ok(Self {
            spec: CheckSpec::new(Self::ID, "Code structure", CheckCategory::Structure, Severity::Medium),
            max_file_lines,
            snake_case: Regex::new(r"^[a-z][a-z0-9_]*$")?,
        })
    }
}

#[async_trait]
impl QualityCheck for StructureCheck {
    fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    async fn run(&self, context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
        let mut findings = Vec::new();

        for file in context.files.iter().filter(|f| f.text().is_some()) {
            if file.extension() == Some("rs") {
                let stem = Path::new(&file.path)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default();
                if !self.snake_case.is_match(stem) {
                    findings.push(
                        Finding::new(Self::ID, Severity::Low, format!("module file name `{stem}` is not snake_case"))
                            .at(&file.path, None)
                            .with_suggestion("rename the file to snake_case"),
                    );
                }
            }

            let lines = file.text().map_or(0, |t| t.lines().count());
            if lines > self.max_file_lines {
                findings.push(
                    Finding::new(
                        Self::ID,
                        Severity::Medium,
                        format!("{lines} lines exceeds the limit of {}", self.max_file_lines),
                    )
                    .at(&file.path, None)
                    .with_suggestion("split the file into smaller modules")
                    .with_impact("large files are harder to review", Effort::Medium),
                );
            }
        }

        Ok(CheckOutcome::from_findings(findings, 0.1))
    }
}
