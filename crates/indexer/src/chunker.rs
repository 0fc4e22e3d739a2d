use crate::Result;
use regex::Regex;
use std::sync::LazyLock;

/// A contiguous slice of a file, lines 1-indexed and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    pub chunk_type: String,
}

pub trait Chunker: Send + Sync {
    /// Split redacted file content into chunks, in source order.
    fn chunk(&self, content: &str, language: &str) -> Result<Vec<Chunk>>;
}

/// Line-oriented chunker driven by per-language boundary patterns.
///
/// Boundaries start a new section: markdown headers, top-level YAML keys, TOML tables and
/// declarations in the code languages it knows. Everything else falls back to blank-line
/// paragraphs. Sections longer than `max_lines` are cut into consecutive windows.
#[derive(Debug, Clone)]
pub struct LineChunker {
    max_lines: usize,
}

pub const DEFAULT_MAX_LINES: usize = 200;

impl LineChunker {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines: max_lines.max(1),
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    fn sections(lines: &[&str], language: &str) -> Vec<Section> {
        match language {
            "markdown" => markdown_sections(lines),
            "yaml" => boundary_sections(lines, |line| {
                YAML_TOP_LEVEL_KEY.is_match(line).then_some("config_key")
            }),
            "toml" => boundary_sections(lines, |line| {
                TOML_TABLE.is_match(line).then_some("config_key")
            }),
            other => match declaration_pattern(other) {
                Some(pattern) => {
                    let sections = boundary_sections(lines, |line| {
                        pattern.is_match(line).then(|| classify_declaration(line))
                    });
                    if sections.iter().any(|s| s.kind != PREAMBLE) {
                        sections
                    } else {
                        whole(lines, "code")
                    }
                }
                None => paragraph_sections(lines),
            },
        }
    }

    fn emit(&self, lines: &[&str], section: &Section, out: &mut Vec<Chunk>) {
        let mut end = section.end;
        while end > section.start && lines[end - 1].trim().is_empty() {
            end -= 1;
        }
        let mut start = section.start;
        while start < end && lines[start].trim().is_empty() {
            start += 1;
        }

        while start < end {
            let window_end = (start + self.max_lines).min(end);
            let window = &lines[start..window_end];
            if window.iter().any(|line| !line.trim().is_empty()) {
                out.push(Chunk {
                    content: window.join("\n"),
                    start_line: (start + 1) as u32,
                    end_line: window_end as u32,
                    chunk_type: section.kind.to_string(),
                });
            }
            start = window_end;
        }
    }
}

impl Default for LineChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl Chunker for LineChunker {
    fn chunk(&self, content: &str, language: &str) -> Result<Vec<Chunk>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();
        for section in Self::sections(&lines, language) {
            self.emit(&lines, &section, &mut chunks);
        }
        Ok(chunks)
    }
}

/// Half-open line range `[start, end)`, zero-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    start: usize,
    end: usize,
    kind: &'static str,
}

const PREAMBLE: &str = "preamble";

fn whole(lines: &[&str], kind: &'static str) -> Vec<Section> {
    vec![Section {
        start: 0,
        end: lines.len(),
        kind,
    }]
}

/// Cut at every line for which `boundary` yields a kind; leading lines become a preamble.
fn boundary_sections<F>(lines: &[&str], mut boundary: F) -> Vec<Section>
where
    F: FnMut(&str) -> Option<&'static str>,
{
    let mut sections = Vec::new();
    let mut current = Section {
        start: 0,
        end: 0,
        kind: PREAMBLE,
    };
    for (idx, &line) in lines.iter().enumerate() {
        if let Some(kind) = boundary(line) {
            if idx > current.start {
                current.end = idx;
                sections.push(current);
            }
            current = Section {
                start: idx,
                end: idx,
                kind,
            };
        }
    }
    current.end = lines.len();
    sections.push(current);
    sections
}

fn markdown_sections(lines: &[&str]) -> Vec<Section> {
    let mut in_fence = false;
    boundary_sections(lines, |line| {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            return None;
        }
        (!in_fence && MARKDOWN_HEADER.is_match(line)).then_some("header")
    })
}

fn paragraph_sections(lines: &[&str]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, line) in lines.iter().enumerate() {
        match (line.trim().is_empty(), start) {
            (true, Some(s)) => {
                sections.push(Section {
                    start: s,
                    end: idx,
                    kind: "paragraph",
                });
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(s) = start {
        sections.push(Section {
            start: s,
            end: lines.len(),
            kind: "paragraph",
        });
    }
    sections
}

fn declaration_pattern(language: &str) -> Option<&'static Regex> {
    let pattern = match language {
        "go" => &*GO_DECLARATION,
        "python" => &*PYTHON_DECLARATION,
        "javascript" | "typescript" => &*JS_DECLARATION,
        "java" => &*JAVA_DECLARATION,
        "rust" => &*RUST_DECLARATION,
        "ruby" => &*RUBY_DECLARATION,
        _ => return None,
    };
    Some(pattern)
}

fn classify_declaration(line: &str) -> &'static str {
    let head = line.split('(').next().unwrap_or(line);
    if TYPE_KEYWORD.is_match(head) {
        "class"
    } else {
        "function"
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid chunker pattern")
}

static MARKDOWN_HEADER: LazyLock<Regex> = LazyLock::new(|| compile(r"^#{1,6}\s"));
static YAML_TOP_LEVEL_KEY: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"^(?:[A-Za-z_][\w.\-]*|"[^"]+"|'[^']+')\s*:(?:\s|$)"#));
static TOML_TABLE: LazyLock<Regex> = LazyLock::new(|| compile(r"^\[\[?[^\]]+\]\]?\s*$"));

static GO_DECLARATION: LazyLock<Regex> = LazyLock::new(|| compile(r"^(?:func|type)\s"));
static PYTHON_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(?:async\s+def|def|class)\s+\w+"));
static JS_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?(?:function\b|abstract\s+class\b|class\b|interface\b)|^(?:export\s+)?const\s+\w+\s*=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*=>",
    )
});
static JAVA_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^(?:class|interface|enum|record)\s|^\s*(?:public|private|protected)\b[^=;]*(?:\bclass\b|\binterface\b|\benum\b|\()")
});
static RUST_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r#"^(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|const|unsafe|extern\s+"[^"]*")\s+)*(?:fn|struct|enum|trait|impl|mod|union)\b"#)
});
static RUBY_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*(?:def|class|module)\s"));
static TYPE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:class|struct|enum|trait|interface|impl|type|module|union|record)\b")
});
