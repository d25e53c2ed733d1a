//! Signature scanner
//!
//! Compiles YARA rule files with `yara-x` and scans the file an event
//! points at. Rule conditions are evaluated in full; only matching public
//! rules are reported.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use yara_x::{Compiler, Rules, Scanner, SourceCode};

use super::{DetectionError, Detector};
use crate::logic::telemetry::{keys, EventType, SecurityEvent, Severity};

/// Files larger than this are only scanned up to the limit
pub const MAX_SCAN_BYTES: u64 = 16 * 1024 * 1024;

/// A single scan is abandoned after this long
const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

const RULE_EXTENSIONS: &[&str] = &["yar", "yara"];

fn rule_files(path: &Path) -> Result<Vec<PathBuf>, DetectionError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| RULE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

// ============================================================================
// SCANNER
// ============================================================================

pub struct SignatureScanner {
    rules: Rules,
    rule_count: usize,
}

impl SignatureScanner {
    /// Compile rules held in memory
    pub fn compile(source: &str) -> Result<Self, DetectionError> {
        let mut compiler = Compiler::new();
        compiler
            .add_source(source)
            .map_err(|e| DetectionError::InvalidRules(e.to_string()))?;
        Ok(Self::from_rules(compiler.build()))
    }

    /// Compile a rule file, or every `.yar`/`.yara` file of a directory.
    /// Any compile error fails the whole load.
    pub fn load(path: &Path) -> Result<Self, DetectionError> {
        let mut compiler = Compiler::new();

        for file in rule_files(path)? {
            let source = std::fs::read_to_string(&file)?;
            let origin = file.to_string_lossy().to_string();
            compiler
                .add_source(SourceCode::from(source.as_str()).with_origin(origin))
                .map_err(|e| DetectionError::InvalidRules(e.to_string()))?;
            log::info!("[signature] compiled {}", file.display());
        }

        let scanner = Self::from_rules(compiler.build());
        if scanner.rule_count == 0 {
            log::warn!("[signature] no rules under {}, scanning disabled", path.display());
        } else {
            log::info!("[signature] {} rules loaded", scanner.rule_count);
        }
        Ok(scanner)
    }

    fn from_rules(rules: Rules) -> Self {
        let rule_count = rules.iter().count();
        Self { rules, rule_count }
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// Identifiers of every rule matching the file (first `MAX_SCAN_BYTES`)
    pub fn scan_file(&self, path: &Path) -> Result<Vec<String>, DetectionError> {
        let size = std::fs::metadata(path)?.len();

        let mut scanner = Scanner::new(&self.rules);
        scanner.set_timeout(SCAN_TIMEOUT);

        let mut data = Vec::new();
        let results = if size > MAX_SCAN_BYTES {
            File::open(path)?.take(MAX_SCAN_BYTES).read_to_end(&mut data)?;
            scanner.scan(&data)
        } else {
            scanner.scan_file(path)
        }
        .map_err(|e| DetectionError::ScanFailed(e.to_string()))?;

        Ok(results
            .matching_rules()
            .map(|rule| rule.identifier().to_string())
            .collect())
    }

    fn target(event: &SecurityEvent) -> Option<&str> {
        match event.event_type() {
            EventType::Process => event.detail_str(keys::EXE),
            EventType::File => event.detail_str(keys::PATH),
            _ => None,
        }
        .filter(|p| !p.is_empty())
    }
}

impl Detector for SignatureScanner {
    fn name(&self) -> &str {
        "signature"
    }

    fn inspect(&mut self, event: &mut SecurityEvent) -> Result<(), DetectionError> {
        if self.rule_count == 0 {
            return Ok(());
        }
        let Some(target) = Self::target(event).map(PathBuf::from) else {
            return Ok(());
        };

        let matches = self.scan_file(&target)?;
        if !matches.is_empty() {
            log::warn!("[signature] match on {}: {:?}", target.display(), matches);
            event.insert_detail(keys::YARA_MATCHES, matches);
            event.escalate_severity(Severity::Critical);
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RULES: &str = r#"
rule EICAR_Test : test
{
    meta:
        description = "EICAR test string"
    strings:
        $a = "EICAR-STANDARD-ANTIVIRUS-TEST-FILE"
    condition:
        $a
}

rule Mz_Stub {
    strings:
        $mz = { 4D 5A ?? 00 }
        $msg = "this program cannot be run" nocase
    condition:
        $mz at 0 and $msg
}
"#;

    const CONDITIONS: &str = r#"
rule Needs_Both {
    strings:
        $a = "alpha-marker"
        $b = "beta-marker"
    condition:
        $a and $b
}

rule Large_Only {
    strings:
        $x = "benign"
    condition:
        $x and filesize > 1MB
}

rule Alpha_Only {
    strings:
        $a = "alpha-marker"
    condition:
        $a
}
"#;

    fn write_sample(dir: &TempDir, contents: &[u8]) -> PathBuf {
        let sample = dir.path().join("sample.bin");
        std::fs::write(&sample, contents).unwrap();
        sample
    }

    #[test]
    fn test_conditions_are_evaluated() {
        let temp_dir = TempDir::new().unwrap();
        let sample = write_sample(&temp_dir, b"alpha-marker ... benign");

        let scanner = SignatureScanner::compile(CONDITIONS).unwrap();
        assert_eq!(scanner.rule_count(), 3);
        assert_eq!(scanner.scan_file(&sample).unwrap(), vec!["Alpha_Only".to_string()]);
    }

    #[test]
    fn test_compile_error_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let rules = temp_dir.path().join("broken.yar");
        std::fs::write(&rules, "rule Broken { strings: $a = \"x\" condition: $b }").unwrap();

        assert!(matches!(
            SignatureScanner::load(&rules),
            Err(DetectionError::InvalidRules(_))
        ));
    }

    #[test]
    fn test_load_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.yar"), RULES).unwrap();
        std::fs::write(
            temp_dir.path().join("b.YARA"),
            "rule Other { strings: $s = \"other\" condition: $s }",
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "not a rule file").unwrap();

        let scanner = SignatureScanner::load(temp_dir.path()).unwrap();
        assert_eq!(scanner.rule_count(), 3);
    }

    #[test]
    fn test_empty_directory_disables_scanning() {
        let temp_dir = TempDir::new().unwrap();
        let mut scanner = SignatureScanner::load(temp_dir.path()).unwrap();
        assert_eq!(scanner.rule_count(), 0);

        let mut event = SecurityEvent::new(EventType::File, Severity::High, "changed")
            .with_detail(keys::PATH, "/nonexistent/file");
        scanner.inspect(&mut event).unwrap();
        assert_eq!(event.severity(), Severity::High);
    }

    #[test]
    fn test_missing_rules_path_is_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(SignatureScanner::load(&temp_dir.path().join("missing.yar")).is_err());
    }

    #[test]
    fn test_match_escalates_to_critical() {
        let temp_dir = TempDir::new().unwrap();
        let sample = write_sample(&temp_dir, b"MZ\x90\x00 THIS PROGRAM CANNOT BE RUN in DOS mode");

        let mut scanner = SignatureScanner::compile(RULES).unwrap();
        let mut event = SecurityEvent::new(EventType::File, Severity::High, "changed")
            .with_detail(keys::PATH, sample.to_string_lossy().to_string());

        scanner.inspect(&mut event).unwrap();
        assert_eq!(event.severity(), Severity::Critical);
        assert_eq!(event.detail(keys::YARA_MATCHES), Some(&serde_json::json!(["Mz_Stub"])));
    }

    #[test]
    fn test_no_match_leaves_event() {
        let temp_dir = TempDir::new().unwrap();
        // Message present but not at a PE header
        let sample = write_sample(&temp_dir, b"xx this program cannot be run");

        let mut scanner = SignatureScanner::compile(RULES).unwrap();
        let mut event = SecurityEvent::new(EventType::Process, Severity::High, "spawned")
            .with_detail(keys::EXE, sample.to_string_lossy().to_string());

        scanner.inspect(&mut event).unwrap();
        assert_eq!(event.severity(), Severity::High);
        assert!(event.detail(keys::YARA_MATCHES).is_none());
    }

    #[test]
    fn test_no_target_is_noop() {
        let mut scanner = SignatureScanner::compile(RULES).unwrap();
        let mut event = SecurityEvent::new(EventType::Generic, Severity::Low, "no target");
        scanner.inspect(&mut event).unwrap();
        assert_eq!(event.severity(), Severity::Low);
        assert!(event.detail(keys::YARA_MATCHES).is_none());
    }

    #[test]
    fn test_unreadable_target_is_error() {
        let mut scanner = SignatureScanner::compile(RULES).unwrap();
        let mut event = SecurityEvent::new(EventType::Process, Severity::High, "gone")
            .with_detail(keys::EXE, "/nonexistent/binary");
        assert!(scanner.inspect(&mut event).is_err());
        assert_eq!(event.severity(), Severity::High);
    }
}
