//! Mapping arbitrary (often accented) file names to unique ASCII tokens.
//!
//! The original corpus this tool was built for is mostly Hungarian, so we
//! keep an explicit substitution table for the Latin diacritics those file
//! names actually contain, with a general Unicode decomposition pass as a
//! safety net for everything else.

use std::{
    collections::{HashMap, HashSet},
    fs,
};

use regex::Regex;
use unicode_normalization::{UnicodeNormalization as _, char::is_combining_mark};

use crate::prelude::*;

/// Token used when sanitization strips a name down to nothing.
const EMPTY_NAME_PLACEHOLDER: &str = "document";

/// Accented → base-Latin substitutions, applied before the general
/// decomposition pass.
const ACCENT_SUBSTITUTIONS: &[(char, char)] = &[
    ('á', 'a'), ('à', 'a'), ('â', 'a'), ('ä', 'a'), ('ã', 'a'), ('å', 'a'),
    ('é', 'e'), ('è', 'e'), ('ê', 'e'), ('ë', 'e'),
    ('í', 'i'), ('ì', 'i'), ('î', 'i'), ('ï', 'i'),
    ('ó', 'o'), ('ò', 'o'), ('ô', 'o'), ('ö', 'o'), ('õ', 'o'), ('ő', 'o'),
    ('ú', 'u'), ('ù', 'u'), ('û', 'u'), ('ü', 'u'), ('ű', 'u'),
    ('ý', 'y'), ('ÿ', 'y'),
    ('ñ', 'n'), ('ç', 'c'),
    ('Á', 'A'), ('À', 'A'), ('Â', 'A'), ('Ä', 'A'), ('Ã', 'A'), ('Å', 'A'),
    ('É', 'E'), ('È', 'E'), ('Ê', 'E'), ('Ë', 'E'),
    ('Í', 'I'), ('Ì', 'I'), ('Î', 'I'), ('Ï', 'I'),
    ('Ó', 'O'), ('Ò', 'O'), ('Ô', 'O'), ('Ö', 'O'), ('Õ', 'O'), ('Ő', 'O'),
    ('Ú', 'U'), ('Ù', 'U'), ('Û', 'U'), ('Ü', 'U'), ('Ű', 'U'),
    ('Ý', 'Y'), ('Ÿ', 'Y'),
    ('Ñ', 'N'), ('Ç', 'C'),
];

/// Assigns each input path a unique ASCII-safe base name for the lifetime
/// of one run. The mapping is append-only and serialized to a report file
/// at the end of the run.
pub struct FilenameSanitizer {
    /// Original path → token, in first-seen order.
    assigned: Vec<(PathBuf, String)>,

    /// Lookup index into `assigned`.
    by_path: HashMap<PathBuf, usize>,

    /// Every token handed out so far.
    used: HashSet<String>,

    /// Runs of whitespace, hyphens and dots become a single underscore.
    separators: Regex,

    /// Anything outside `[A-Za-z0-9_]` is dropped.
    disallowed: Regex,

    /// Runs of underscores collapse to one.
    underscores: Regex,
}

impl Default for FilenameSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FilenameSanitizer {
    pub fn new() -> Self {
        Self {
            assigned: Vec::new(),
            by_path: HashMap::new(),
            used: HashSet::new(),
            separators: Regex::new(r"[\s\-.]+").expect("bad separator regex"),
            disallowed: Regex::new(r"[^A-Za-z0-9_]").expect("bad disallowed regex"),
            underscores: Regex::new(r"_+").expect("bad underscore regex"),
        }
    }

    /// Get the unique token for `path`, assigning one if we haven't seen
    /// this path before. Idempotent within a run, and never fails.
    pub fn sanitize(&mut self, path: &Path) -> String {
        if let Some(&idx) = self.by_path.get(path) {
            return self.assigned[idx].1.clone();
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut name = apply_accent_substitutions(&stem);
        name = strip_combining_marks(&name);
        name = self.clean_special_characters(&name);
        if name.is_empty() {
            name = EMPTY_NAME_PLACEHOLDER.to_owned();
        }
        let token = self.ensure_unique(name);

        self.by_path.insert(path.to_owned(), self.assigned.len());
        self.assigned.push((path.to_owned(), token.clone()));
        self.used.insert(token.clone());
        token
    }

    fn clean_special_characters(&self, text: &str) -> String {
        let text = self.separators.replace_all(text, "_");
        let text = self.disallowed.replace_all(&text, "");
        let text = self.underscores.replace_all(&text, "_");
        text.trim_matches('_').to_owned()
    }

    fn ensure_unique(&self, name: String) -> String {
        if !self.used.contains(&name) {
            return name;
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{}_{}", name, counter);
            if !self.used.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Render the original → token mapping as a human-readable report.
    pub fn mapping_report(&self) -> String {
        if self.assigned.is_empty() {
            return "No files processed yet.".to_owned();
        }
        let mut report = String::from("Filename Mappings:\n");
        report.push_str(&"=".repeat(50));
        report.push('\n');
        for (original, token) in &self.assigned {
            let original_name = original
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            report.push_str(&format!("{} -> {}.md\n", original_name, token));
        }
        report
    }

    /// Write the mapping report to `filename_mappings.txt` under `output_dir`.
    pub fn save_mapping_file(&self, output_dir: &Path) -> Result<()> {
        let mapping_file = output_dir.join("filename_mappings.txt");
        fs::write(&mapping_file, self.mapping_report()).with_context(|| {
            format!("failed to write mapping file {}", mapping_file.display())
        })?;
        Ok(())
    }
}

fn apply_accent_substitutions(text: &str) -> String {
    text.chars()
        .map(|c| {
            ACCENT_SUBSTITUTIONS
                .iter()
                .find(|(accented, _)| *accented == c)
                .map(|&(_, base)| base)
                .unwrap_or(c)
        })
        .collect()
}

/// Decompose to NFD and drop combining marks, as a second pass for accented
/// characters not covered by the substitution table.
fn strip_combining_marks(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hungarian_accents() {
        let mut sanitizer = FilenameSanitizer::new();
        assert_eq!(sanitizer.sanitize(Path::new("aegon-ászf.pdf")), "aegon_aszf");
        assert_eq!(
            sanitizer.sanitize(Path::new("erste-elidegen-törl2010.pdf")),
            "erste_elidegen_torl2010"
        );
    }

    #[test]
    fn collapses_separators_and_trims() {
        let mut sanitizer = FilenameSanitizer::new();
        assert_eq!(
            sanitizer.sanitize(Path::new("csernak_bence-hasznalati_megall-.pdf")),
            "csernak_bence_hasznalati_megall"
        );
        assert_eq!(
            sanitizer.sanitize(Path::new("Törökbálint vevők aláírt előszerződés16.10.18..pdf")),
            "Torokbalint_vevok_alairt_eloszerzodes16_10_18"
        );
    }

    #[test]
    fn idempotent_for_same_path() {
        let mut sanitizer = FilenameSanitizer::new();
        let first = sanitizer.sanitize(Path::new("dir/report.pdf"));
        let second = sanitizer.sanitize(Path::new("dir/report.pdf"));
        assert_eq!(first, second);
    }

    #[test]
    fn colliding_names_get_numeric_suffixes_in_order() {
        let mut sanitizer = FilenameSanitizer::new();
        assert_eq!(sanitizer.sanitize(Path::new("a/report.pdf")), "report");
        assert_eq!(sanitizer.sanitize(Path::new("b/report.pdf")), "report_1");
        assert_eq!(sanitizer.sanitize(Path::new("c/report.pdf")), "report_2");
    }

    #[test]
    fn suffix_skips_tokens_already_taken() {
        let mut sanitizer = FilenameSanitizer::new();
        assert_eq!(sanitizer.sanitize(Path::new("report_1.pdf")), "report_1");
        assert_eq!(sanitizer.sanitize(Path::new("a/report.pdf")), "report");
        // `report_1` is taken, so the collision resolves to `_2`.
        assert_eq!(sanitizer.sanitize(Path::new("b/report.pdf")), "report_2");
    }

    #[test]
    fn empty_result_uses_placeholder() {
        let mut sanitizer = FilenameSanitizer::new();
        assert_eq!(sanitizer.sanitize(Path::new("!!!.pdf")), "document");
        assert_eq!(sanitizer.sanitize(Path::new("???.pdf")), "document_1");
    }

    #[test]
    fn mapping_report_lists_first_seen_order() {
        let mut sanitizer = FilenameSanitizer::new();
        sanitizer.sanitize(Path::new("zeta.pdf"));
        sanitizer.sanitize(Path::new("alpha.pdf"));
        let report = sanitizer.mapping_report();
        let zeta = report.find("zeta.pdf -> zeta.md").unwrap();
        let alpha = report.find("alpha.pdf -> alpha.md").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn save_mapping_file_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut sanitizer = FilenameSanitizer::new();
        sanitizer.sanitize(Path::new("aegon-ászf.pdf"));
        sanitizer.save_mapping_file(dir.path()).unwrap();
        let report =
            std::fs::read_to_string(dir.path().join("filename_mappings.txt")).unwrap();
        assert!(report.contains("aegon-ászf.pdf -> aegon_aszf.md"));
    }
}
