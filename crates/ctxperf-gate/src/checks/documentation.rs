use async_trait::async_trait;
use regex::Regex;

use crate::check::{CheckCategory, CheckOutcome, CheckSpec, Effort, Finding, QualityCheck, Severity};
use crate::context::ChangeContext;
use crate::error::GateResult;

/// Code changes should come with documentation, and new public Rust
/// functions with doc comments.
#[derive(Debug)]
pub struct DocumentationCheck {
    spec: CheckSpec,
    pub_fn: Regex,
}

impl DocumentationCheck {
    pub const ID: &'static str = "documentation";

    pub fn new() -> GateResult<Self> {
        Ok(Self {
            spec: CheckSpec::new(Self::ID, "Documentation", CheckCategory::Documentation, Severity::Low),
            pub_fn: Regex::new(r"^\s*pub(\([a-z]+\))?\s+(async\s+)?fn\s+(\w+)")?,
        })
    }

    fn undocumented_fns(&self, path: &str, text: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        let mut documented = false;
        for (n, line) in text.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("#[") {
                continue;
            }
            if let Some(caps) = self.pub_fn.captures(line) {
                // pub(crate) and friends are not public API
                if caps.get(1).is_none() && !documented {
                    findings.push(
                        Finding::new(Self::ID, Severity::Low, format!("public fn `{}` has no doc comment", &caps[3]))
                            .at(path, Some(n + 1))
                            .with_suggestion("add a /// comment describing what it does"),
                    );
                }
            }
            documented = trimmed.starts_with("///");
        }
        findings
    }
}

#[async_trait]
impl QualityCheck for DocumentationCheck {
    fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    async fn run(&self, context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
        let mut findings = Vec::new();

        if context.code_files().next().is_some() && !context.touches_docs() {
            findings.push(
                Finding::new(Self::ID, Severity::Medium, "code changed without documentation updates")
                    .with_suggestion("update the README or docs/ for behavior changes")
                    .with_impact("docs drift from the code", Effort::Low),
            );
        }

        for file in context.code_files().filter(|f| f.extension() == Some("rs")) {
            if let Some(text) = file.text() {
                findings.extend(self.undocumented_fns(&file.path, text));
            }
        }

        Ok(CheckOutcome::from_findings(findings, 0.05))
    }
}
