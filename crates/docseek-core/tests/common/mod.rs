//! Shared fixtures: a workspace with two roots of office documents

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use docseek_core::{discover, init_workspace, Database};
use tempfile::TempDir;

pub struct TestWorkspace {
    pub dir: TempDir,
    pub reports: PathBuf,
    pub archive: PathBuf,
}

impl TestWorkspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn db(&self) -> Database {
        Database::open(&discover::db_path(self.path())).unwrap()
    }

    /// Registered root strings, in registry order.
    pub fn roots(&self) -> Vec<String> {
        self.db()
            .list_roots()
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect()
    }
}

/// Workspace with `reports/` (txt, md, docx, xlsx) and `archive/` (txt),
/// both registered as roots.
pub fn workspace() -> TestWorkspace {
    let dir = tempfile::tempdir().unwrap();
    init_workspace(dir.path()).unwrap();

    let reports = dir.path().join("reports");
    let archive = dir.path().join("archive");
    fs::create_dir_all(reports.join("2024")).unwrap();
    fs::create_dir_all(&archive).unwrap();

    fs::write(
        reports.join("summary.txt"),
        "Quarterly summary\nRevenue grew in the north region\nBudget is on track\n",
    )
    .unwrap();
    fs::write(
        reports.join("2024").join("plan.md"),
        "# Plan\n\nHire two engineers\nReview the budget in May\n",
    )
    .unwrap();
    write_docx(
        &reports.join("minutes.docx"),
        &["Board meeting minutes", "The budget was approved unanimously"],
    );
    write_xlsx(
        &reports.join("costs.xlsx"),
        "Travel",
        &[("A1", "Destination"), ("B1", "Cost"), ("A2", "Berlin"), ("B2", "1200")],
    );
    fs::write(archive.join("old.txt"), "Old budget from 2019\n").unwrap();

    let db = Database::open(&discover::db_path(dir.path())).unwrap();
    db.add_root(&reports).unwrap();
    db.add_root(&archive).unwrap();

    TestWorkspace {
        dir,
        reports,
        archive,
    }
}

fn write_zip(path: &Path, parts: &[(&str, String)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, content) in parts {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

pub fn write_docx(path: &Path, paragraphs: &[&str]) {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    write_zip(path, &[("word/document.xml", document)]);
}

/// A one-sheet workbook with inline string cells.
pub fn write_xlsx(path: &Path, sheet: &str, cells: &[(&str, &str)]) {
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{sheet}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    );
    let rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#
        .to_string();

    let mut rows: Vec<(u32, String)> = Vec::new();
    for (reference, value) in cells {
        let row: u32 = reference
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .parse()
            .unwrap();
        let cell = format!(r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#);
        match rows.iter_mut().find(|(r, _)| *r == row) {
            Some((_, xml)) => xml.push_str(&cell),
            None => rows.push((row, cell)),
        }
    }
    let sheet_data: String = rows
        .iter()
        .map(|(row, xml)| format!(r#"<row r="{row}">{xml}</row>"#))
        .collect();
    let worksheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
    );

    write_zip(
        path,
        &[
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", rels),
            ("xl/worksheets/sheet1.xml", worksheet),
        ],
    );
}

/// A one-page PDF showing `text` in Helvetica. `encoding` names the font's
/// `/Encoding`; anything but a standard encoding makes a malformed file.
pub fn write_pdf(path: &Path, text: &str, encoding: &str) {
    let stream = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        format!("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /{encoding} >>"),
        format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
    }

    let xref = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        pdf.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        objects.len() + 1
    ));
    fs::write(path, pdf).unwrap();
}
