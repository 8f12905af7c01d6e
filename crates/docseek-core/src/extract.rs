//! Text extraction from documents
//!
//! Plain text and Markdown are read directly. DOCX and XLSX are zip
//! packages whose XML parts are streamed with quick-xml; PDF text comes
//! from pdf-extract.
//!
//! Two views are offered: [`extract_text`] flattens a document into one
//! string for the full-text index, [`extract_units`] keeps the document's
//! natural units (lines, paragraphs, cells) with their location so live
//! search can point at the match.

use std::collections::HashMap;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::search::Location;
use crate::{DsError, FileType, Result};

/// A searchable piece of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub location: Location,
    pub text: String,
}

/// A non-empty spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
struct Cell {
    row: u32,
    column: String,
    value: String,
}

#[derive(Debug, Clone)]
struct Sheet {
    name: String,
    cells: Vec<Cell>,
}

/// Extract the full text of a document.
pub fn extract_text(path: &Path, file_type: FileType) -> Result<String> {
    match file_type {
        FileType::Txt | FileType::Md => read_plain_text(path),
        FileType::Docx => Ok(docx_paragraphs(path)?.join("\n")),
        FileType::Pdf => read_pdf(path),
        FileType::Xlsx => {
            let mut lines = Vec::new();
            for sheet in xlsx_sheets(path)? {
                let mut current_row = None;
                let mut line: Vec<String> = Vec::new();
                for cell in sheet.cells {
                    if current_row != Some(cell.row) {
                        if !line.is_empty() {
                            lines.push(line.join(" "));
                            line.clear();
                        }
                        current_row = Some(cell.row);
                    }
                    line.push(cell.value);
                }
                if !line.is_empty() {
                    lines.push(line.join(" "));
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

/// Extract the located units of a document for live search.
pub fn extract_units(path: &Path, file_type: FileType) -> Result<Vec<TextUnit>> {
    let units = match file_type {
        FileType::Txt | FileType::Md => read_plain_text(path)?
            .lines()
            .enumerate()
            .map(|(i, line)| TextUnit {
                location: Location::Line(i + 1),
                text: line.to_string(),
            })
            .collect(),
        FileType::Docx => docx_paragraphs(path)?
            .into_iter()
            .enumerate()
            .map(|(i, text)| TextUnit {
                location: Location::Paragraph(i + 1),
                text,
            })
            .collect(),
        FileType::Pdf => vec![TextUnit {
            location: Location::FullText,
            text: read_pdf(path)?,
        }],
        FileType::Xlsx => xlsx_sheets(path)?
            .into_iter()
            .flat_map(|sheet| {
                let name = sheet.name;
                sheet.cells.into_iter().map(move |cell| TextUnit {
                    location: Location::Cell {
                        sheet: name.clone(),
                        row: cell.row,
                        column: cell.column,
                    },
                    text: cell.value,
                })
            })
            .collect(),
    };
    Ok(units)
}

fn extract_error(path: &Path, message: impl ToString) -> DsError {
    DsError::Extract {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn read_plain_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// pdf-extract panics on some malformed input (unknown encodings, broken
/// font tables). A panic is turned into an extraction error for this file.
fn read_pdf(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes))) {
        Ok(result) => result.map_err(|e| extract_error(path, e)),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown error".to_string());
            Err(extract_error(path, format!("PDF parser panicked: {message}")))
        }
    }
}

/// Read one part of a zip package as a string, `None` if absent.
fn read_zip_part(path: &Path, name: &str) -> Result<Option<String>> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| extract_error(path, e))?;
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(extract_error(path, e)),
    };
    let mut content = String::new();
    part.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn attribute(element: &BytesStart, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Paragraph texts of `word/document.xml` in document order, empty
/// paragraphs included. A paragraph nested in another one (text boxes)
/// becomes its own entry right after its anchor paragraph; `mc:Fallback`
/// copies of text boxes are skipped.
fn docx_paragraphs(path: &Path) -> Result<Vec<String>> {
    let xml = read_zip_part(path, "word/document.xml")?
        .ok_or_else(|| extract_error(path, "missing word/document.xml"))?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs: Vec<String> = Vec::new();
    // Indices into `paragraphs` of the paragraphs still open, innermost last.
    let mut open: Vec<usize> = Vec::new();
    let mut in_text = false;
    let mut fallback_depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| extract_error(path, e))?;

        if fallback_depth > 0 {
            match event {
                Event::Start(e) if e.name().as_ref() == b"mc:Fallback" => fallback_depth += 1,
                Event::End(e) if e.name().as_ref() == b"mc:Fallback" => fallback_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        let current = open.last().copied();
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    open.push(paragraphs.len());
                    paragraphs.push(String::new());
                }
                b"w:t" => in_text = true,
                b"mc:Fallback" => fallback_depth = 1,
                _ => {}
            },
            Event::Empty(e) => match (e.name().as_ref(), current) {
                (b"w:tab", Some(i)) => paragraphs[i].push('\t'),
                (b"w:br" | b"w:cr", Some(i)) => paragraphs[i].push(' '),
                (b"w:p", _) => paragraphs.push(String::new()),
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(i) = current {
                    let text = t.unescape().map_err(|e| extract_error(path, e))?;
                    paragraphs[i].push_str(&text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    open.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// `<si>` entries of `xl/sharedStrings.xml`.
fn xlsx_shared_strings(path: &Path) -> Result<Vec<String>> {
    let Some(xml) = read_zip_part(path, "xl/sharedStrings.xml")? else {
        return Ok(Vec::new());
    };

    let mut reader = Reader::from_str(&xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| extract_error(path, e))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(extract_error(path, e)),
            _ => {}
        }
    }

    Ok(strings)
}

/// Sheet names and their part paths, in workbook order.
fn xlsx_sheet_parts(path: &Path) -> Result<Vec<(String, String)>> {
    let workbook = read_zip_part(path, "xl/workbook.xml")?
        .ok_or_else(|| extract_error(path, "missing xl/workbook.xml"))?;

    let mut targets = HashMap::new();
    if let Some(rels) = read_zip_part(path, "xl/_rels/workbook.xml.rels")? {
        let mut reader = Reader::from_str(&rels);
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    if let (Some(id), Some(target)) =
                        (attribute(&e, b"Id"), attribute(&e, b"Target"))
                    {
                        let part = match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("xl/{target}"),
                        };
                        targets.insert(id, part);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(extract_error(path, e)),
                _ => {}
            }
        }
    }

    let mut sheets = Vec::new();
    let mut reader = Reader::from_str(&workbook);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name").unwrap_or_default();
                let part = attribute(&e, b"r:id")
                    .and_then(|id| targets.get(&id).cloned())
                    .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", sheets.len() + 1));
                sheets.push((name, part));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(extract_error(path, e)),
            _ => {}
        }
    }

    Ok(sheets)
}

/// Split a cell reference like `AB12` into (`AB`, 12).
fn split_cell_ref(reference: &str) -> Option<(String, u32)> {
    let digits = reference.find(|c: char| c.is_ascii_digit())?;
    let (column, row) = reference.split_at(digits);
    if column.is_empty() {
        return None;
    }
    Some((column.to_string(), row.parse().ok()?))
}

/// Convert a 1-based column number to its letters (1 -> A, 27 -> AA).
fn column_letters(mut n: u32) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn xlsx_sheets(path: &Path) -> Result<Vec<Sheet>> {
    let shared = xlsx_shared_strings(path)?;
    let mut sheets = Vec::new();

    for (name, part) in xlsx_sheet_parts(path)? {
        let Some(xml) = read_zip_part(path, &part)? else {
            tracing::debug!("sheet part {part} missing in {}", path.display());
            continue;
        };
        sheets.push(Sheet {
            name,
            cells: parse_sheet(path, &xml, &shared)?,
        });
    }

    Ok(sheets)
}

fn parse_sheet(path: &Path, xml: &str, shared: &[String]) -> Result<Vec<Cell>> {
    let mut reader = Reader::from_str(xml);
    let mut cells = Vec::new();

    let mut row_number = 0u32;
    let mut column_number = 0u32;
    let mut cell_ref: Option<(String, u32)> = None;
    let mut cell_type = String::new();
    let mut value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"row" => {
                    row_number = attribute(&e, b"r")
                        .and_then(|r| r.parse().ok())
                        .unwrap_or(row_number + 1);
                    column_number = 0;
                }
                b"c" => {
                    column_number += 1;
                    cell_ref = attribute(&e, b"r").and_then(|r| split_cell_ref(&r));
                    cell_type = attribute(&e, b"t").unwrap_or_default();
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"c" => column_number += 1,
            Ok(Event::Text(t)) if in_value => {
                let text = t.unescape().map_err(|e| extract_error(path, e))?;
                value.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let resolved = match cell_type.as_str() {
                        "s" => value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i).cloned())
                            .unwrap_or_default(),
                        "b" => match value.trim() {
                            "1" => "TRUE".to_string(),
                            _ => "FALSE".to_string(),
                        },
                        _ => value.clone(),
                    };
                    if !resolved.trim().is_empty() {
                        let (column, row) = cell_ref
                            .take()
                            .unwrap_or_else(|| (column_letters(column_number), row_number));
                        cells.push(Cell {
                            row,
                            column,
                            value: resolved,
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(extract_error(path, e)),
            _ => {}
        }
    }

    Ok(cells)
}
