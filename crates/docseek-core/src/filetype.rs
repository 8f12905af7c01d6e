//! Supported document types

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix of Office lock files (`~$report.docx`), never indexed.
const LOCK_FILE_PREFIX: &str = "~$";

/// A document type docseek knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Txt,
    Md,
    Docx,
    Pdf,
    Xlsx,
}

impl FileType {
    pub const ALL: [FileType; 5] = [
        FileType::Txt,
        FileType::Md,
        FileType::Docx,
        FileType::Pdf,
        FileType::Xlsx,
    ];

    /// Detect the type of a file from its name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with(LOCK_FILE_PREFIX) {
            return None;
        }
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext)
    }

    /// Detect the type from a file extension (case-insensitive, no dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Md),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// The label stored in the `file_type` column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Txt => "TXT",
            Self::Md => "MD",
            Self::Docx => "DOCX",
            Self::Pdf => "PDF",
            Self::Xlsx => "XLSX",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| format!("unsupported file type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(FileType::from_path(Path::new("a/b/report.DOCX")), Some(FileType::Docx));
        assert_eq!(FileType::from_path(Path::new("notes.md")), Some(FileType::Md));
        assert_eq!(FileType::from_path(Path::new("budget.xlsx")), Some(FileType::Xlsx));
        assert_eq!(FileType::from_path(Path::new("image.png")), None);
        assert_eq!(FileType::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_lock_files_are_ignored() {
        assert_eq!(FileType::from_path(Path::new("~$budget.xlsx")), None);
        assert_eq!(FileType::from_path(Path::new("docs/~$report.docx")), None);
    }

    #[test]
    fn test_label_round_trip() {
        for ty in FileType::ALL {
            assert_eq!(ty.label().parse::<FileType>().unwrap(), ty);
        }
        assert_eq!(".pdf".parse::<FileType>().unwrap(), FileType::Pdf);
        assert!("doc".parse::<FileType>().is_err());
    }
}
