use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// File-level verdict: some files are never indexed at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileVerdict {
    pub should_skip: bool,
    pub reason: Option<String>,
}

/// An inline secret located by byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub start: usize,
    pub end: usize,
    /// 1-indexed line of `start`.
    pub line: usize,
    pub kind: String,
}

pub trait SecretsScanner: Send + Sync {
    /// Filename-based check, made before the file is read.
    fn scan_file(&self, path: &Path) -> FileVerdict;

    fn scan_content(&self, content: &str) -> Vec<Finding>;

    fn redact(&self, content: &str, findings: &[Finding]) -> String;
}

/// Pattern-based scanner for well-known secret files and inline credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternSecretsScanner;

impl SecretsScanner for PatternSecretsScanner {
    fn scan_file(&self, path: &Path) -> FileVerdict {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return FileVerdict::default();
        };
        let lowered = name.to_ascii_lowercase();

        let matched = SECRET_FILE_NAMES.iter().any(|candidate| lowered == *candidate)
            || SECRET_FILE_PREFIXES
                .iter()
                .any(|prefix| lowered.starts_with(prefix))
            || SECRET_FILE_EXTENSIONS
                .iter()
                .any(|ext| lowered.ends_with(ext));

        if matched {
            FileVerdict {
                should_skip: true,
                reason: Some(format!("secret-bearing file name: {name}")),
            }
        } else {
            FileVerdict::default()
        }
    }

    fn scan_content(&self, content: &str) -> Vec<Finding> {
        let mut findings: Vec<Finding> = Vec::new();
        for (kind, pattern) in INLINE_PATTERNS.iter() {
            for m in pattern.find_iter(content) {
                findings.push(Finding {
                    start: m.start(),
                    end: m.end(),
                    line: content[..m.start()].matches('\n').count() + 1,
                    kind: (*kind).to_string(),
                });
            }
        }

        findings.sort_by_key(|f| (f.start, std::cmp::Reverse(f.end)));
        // Drop findings nested inside an earlier, wider one.
        let mut merged: Vec<Finding> = Vec::with_capacity(findings.len());
        for finding in findings {
            match merged.last() {
                Some(last) if finding.start < last.end => continue,
                _ => merged.push(finding),
            }
        }
        merged
    }

    fn redact(&self, content: &str, findings: &[Finding]) -> String {
        if findings.is_empty() {
            return content.to_string();
        }

        let mut ordered: Vec<&Finding> = findings.iter().collect();
        ordered.sort_by_key(|f| f.start);

        let mut out = String::with_capacity(content.len());
        let mut cursor = 0usize;
        for finding in ordered {
            let (start, end) = (finding.start.max(cursor), finding.end.min(content.len()));
            if start >= end || !content.is_char_boundary(start) || !content.is_char_boundary(end)
            {
                continue;
            }
            out.push_str(&content[cursor..start]);
            out.push_str(&format!("[REDACTED:{}]", finding.kind));
            cursor = end;
        }
        out.push_str(&content[cursor..]);
        out
    }
}

const SECRET_FILE_NAMES: &[&str] = &[
    ".env",
    ".netrc",
    ".pgpass",
    ".htpasswd",
    "credentials.json",
    "service-account.json",
    "secrets.yml",
    "secrets.yaml",
];

const SECRET_FILE_PREFIXES: &[&str] = &[".env.", "id_rsa", "id_dsa", "id_ecdsa", "id_ed25519"];

const SECRET_FILE_EXTENSIONS: &[&str] = &[".pem", ".key", ".p12", ".pfx", ".keystore", ".jks"];

static INLINE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        (
            "private_key",
            r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----",
        ),
        ("aws_access_key", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b"),
        ("github_token", r"\bgh[pousr]_[A-Za-z0-9]{36,}\b"),
        ("google_api_key", r"\bAIza[0-9A-Za-z_\-]{35}\b"),
        (
            "assignment",
            r#"(?i)\b(?:api[_-]?key|secret|token|password|passwd)\b\s*[:=]\s*["'][^"'\s]{8,}["']"#,
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid secret pattern")))
    .collect()
});
