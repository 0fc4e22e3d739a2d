use std::path::Path;

pub const UNKNOWN: &str = "unknown";

/// Language and project classification.
pub trait LanguageDetector: Send + Sync {
    /// Language tag of a file; a pure function of its extension.
    fn detect_language(&self, path: &Path) -> String;

    /// Project type of a root, from well-known marker files.
    fn detect_project(&self, root: &Path) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionDetector;

impl LanguageDetector for ExtensionDetector {
    fn detect_language(&self, path: &Path) -> String {
        language_for_path(path).to_string()
    }

    fn detect_project(&self, root: &Path) -> String {
        PROJECT_MARKERS
            .iter()
            .find(|(marker, _)| root.join(marker).is_file())
            .map(|(_, project_type)| (*project_type).to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

pub fn language_for_path(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return UNKNOWN;
    };
    let ext = ext.to_ascii_lowercase();
    EXTENSION_LANGUAGES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, language)| *language)
        .unwrap_or(UNKNOWN)
}

const EXTENSION_LANGUAGES: &[(&str, &str)] = &[
    ("go", "go"),
    ("py", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("java", "java"),
    ("rs", "rust"),
    ("rb", "ruby"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("md", "markdown"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("toml", "toml"),
];

// Checked in order; the first marker present wins.
const PROJECT_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "rust"),
    ("go.mod", "go"),
    ("package.json", "node"),
    ("pyproject.toml", "python"),
    ("requirements.txt", "python"),
    ("setup.py", "python"),
    ("pom.xml", "java"),
    ("build.gradle", "java"),
    ("Gemfile", "ruby"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn maps_extensions_case_insensitively() {
        assert_eq!(language_for_path(Path::new("src/main.rs")), "rust");
        assert_eq!(language_for_path(Path::new("App.TSX")), "typescript");
        assert_eq!(language_for_path(Path::new("config.yml")), "yaml");
        assert_eq!(language_for_path(Path::new("include/x.hpp")), "cpp");
        assert_eq!(language_for_path(Path::new("Makefile")), UNKNOWN);
        assert_eq!(language_for_path(Path::new("data.bin")), UNKNOWN);
    }

    #[test]
    fn detects_project_from_markers() {
        let temp = tempdir().unwrap();
        let detector = ExtensionDetector;
        assert_eq!(detector.detect_project(temp.path()), UNKNOWN);

        fs::write(temp.path().join("package.json"), b"{}").unwrap();
        assert_eq!(detector.detect_project(temp.path()), "node");

        fs::write(temp.path().join("go.mod"), b"module x").unwrap();
        assert_eq!(detector.detect_project(temp.path()), "go");
    }
}
