use async_trait::async_trait;

use super::{scan, LineRule};
use crate::check::{CheckCategory, CheckOutcome, CheckSpec, QualityCheck, Severity};
use crate::context::ChangeContext;
use crate::error::GateResult;

/// Pattern scan for leaked credentials and dangerous calls.
#[derive(Debug)]
pub struct SecurityCheck {
    spec: CheckSpec,
    rules: Vec<LineRule>,
}

impl SecurityCheck {
    pub const ID: &'static str = "security";

    pub fn new() -> GateResult<Self> {
        let rules = vec![
            LineRule::new(
                r#"(?i)\b(api[_-]?key|secret|password|token)\s*[:=]\s*["'][^"']{8,}["']"#,
                Severity::Critical,
                "hard-coded credential",
                "load the value from the environment or a secret store",
                &[],
            )?,
            LineRule::new(
                r"-----BEGIN (RSA |EC |OPENSSH )?PRIVATE KEY-----",
                Severity::Critical,
                "private key committed",
                "remove the key and rotate it",
                &[],
            )?,
            LineRule::new(
                r"\beval\s*\(",
                Severity::High,
                "dynamic code evaluation",
                "parse the input instead of evaluating it",
                &["js", "jsx", "ts", "tsx", "py"],
            )?,
            LineRule::new(
                r#"Command::new\(\s*"(sh|bash)"\s*\)|\bchild_process\.exec\(|os\.system\("#,
                Severity::High,
                "shell command execution",
                "invoke the program directly with explicit arguments",
                &[],
            )?,
            LineRule::new(
                r#"["']http://[^"'\s]*"#,
                Severity::Medium,
                "plain http URL",
                "use https",
                &[],
            )?,
        ];
        Ok(Self {
            spec: CheckSpec::new(Self::ID, "Security scan", CheckCategory::Security, Severity::Critical),
            rules,
        })
    }
}

#[async_trait]
impl QualityCheck for SecurityCheck {
    fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    async fn run(&self, context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
        Ok(CheckOutcome::from_findings(scan(Self::ID, &self.rules, context), 0.25))
    }
}
