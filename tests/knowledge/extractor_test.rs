//! Document extraction tests over generated Word and spreadsheet packages.

use std::io::{Cursor, Write};

use base64::Engine;

use agent_architect::knowledge::extractor::{extract, ExtractedContent, PDF_MIME};
use agent_architect::knowledge::source::SourceKind;

fn package(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(contents.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish package").into_inner()
}

fn text_of(content: ExtractedContent) -> String {
    match content {
        ExtractedContent::Text(text) => text,
        ExtractedContent::Inline { mime_type, .. } => panic!("expected text, got inline {mime_type}"),
    }
}

#[test]
fn docx_paragraphs_become_lines() {
    let document = r#"<?xml version="1.0"?>
<w:document><w:body>
<w:p><w:r><w:t>Opening hours</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve">9 &amp; 17</w:t></w:r></w:p>
<w:p><w:r><w:t>Closed on Sundays</w:t></w:r></w:p>
</w:body></w:document>"#;
    let bytes = package(&[("word/document.xml", document)]);

    let text = text_of(extract(SourceKind::DocumentWord, &bytes).expect("docx extracts"));
    assert_eq!(text, "Opening hours\t9 & 17\nClosed on Sundays");
}

#[test]
fn xlsx_first_sheet_flattens_to_csv() {
    let workbook = r#"<workbook><sheets>
<sheet name="Prices" sheetId="1" r:id="rId7"/>
<sheet name="Other" sheetId="2" r:id="rId8"/>
</sheets></workbook>"#;
    let rels = r#"<Relationships>
<Relationship Id="rId8" Type="worksheet" Target="worksheets/sheet2.xml"/>
<Relationship Id="rId7" Type="worksheet" Target="worksheets/prices.xml"/>
</Relationships>"#;
    let shared = r#"<sst><si><t>Product</t></si><si><t>Panel, large</t></si></sst>"#;
    let prices = r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>Price</t></is></c></row>
<row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>42.5</v></c></row>
</sheetData></worksheet>"#;
    let other = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>ignored</v></c></row></sheetData></worksheet>"#;
    let bytes = package(&[
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", rels),
        ("xl/sharedStrings.xml", shared),
        ("xl/worksheets/prices.xml", prices),
        ("xl/worksheets/sheet2.xml", other),
    ]);

    let text = text_of(extract(SourceKind::DocumentSpreadsheet, &bytes).expect("xlsx extracts"));
    assert_eq!(text, "Product,Price\n\"Panel, large\",42.5");
}

#[test]
fn xlsx_without_workbook_uses_sheet1() {
    let sheet = r#"<worksheet><sheetData><row><c><v>1</v></c><c><v>2</v></c></row></sheetData></worksheet>"#;
    let bytes = package(&[("xl/worksheets/sheet1.xml", sheet)]);
    let text = text_of(extract(SourceKind::DocumentSpreadsheet, &bytes).expect("xlsx extracts"));
    assert_eq!(text, "1,2");
}

#[test]
fn pdf_is_passed_inline() {
    let bytes = b"%PDF-1.7 fake";
    match extract(SourceKind::DocumentPdf, bytes).expect("pdf never fails") {
        ExtractedContent::Inline { mime_type, data } => {
            assert_eq!(mime_type, PDF_MIME);
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(data)
                .expect("valid base64");
            assert_eq!(decoded, bytes);
        }
        ExtractedContent::Text(text) => panic!("expected inline data, got text {text:?}"),
    }
}

#[test]
fn plain_text_is_read_as_is() {
    let text = text_of(extract(SourceKind::PlainText, b"name,price\nA,1").expect("text"));
    assert_eq!(text, "name,price\nA,1");
}

#[test]
fn malformed_packages_fail() {
    assert!(extract(SourceKind::DocumentWord, b"not a zip").is_err());
    let missing = package(&[("other.xml", "<x/>")]);
    assert!(extract(SourceKind::DocumentWord, &missing).is_err());
}
