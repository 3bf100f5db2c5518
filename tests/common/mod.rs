//! PDF fixtures built in memory with lopdf.

#![allow(dead_code)]

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// One line of text placed at a baseline in PDF user space.
#[derive(Debug, Clone)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub bold: bool,
}

pub fn run(text: &str, x: f32, y: f32, size: f32) -> TextRun {
    TextRun {
        text: text.to_string(),
        x,
        y,
        size,
        bold: false,
    }
}

impl TextRun {
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// Build a PDF with one content stream per page.
///
/// Fonts live in page resources; the MediaBox sits on the page tree root so
/// pages have to inherit it.
pub fn build_pdf(pages: &[Vec<TextRun>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for runs in pages {
        let mut operations = Vec::new();
        for run in runs {
            let font = if run.bold { "F2" } else { "F1" };
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![font.into(), Object::Real(run.size)]));
            operations.push(Operation::new(
                "Td",
                vec![Object::Real(run.x), Object::Real(run.y)],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(run.text.as_str())]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

const BODY: [&str; 3] = [
    "The programme funds community projects that improve access to services.",
    "Applications are assessed against the published criteria by two reviewers.",
    "Funding decisions are final once the board has approved the ranking.",
];

/// Body text lines starting at baseline `top`, 16pt apart.
pub fn body(top: f32, lines: usize) -> Vec<TextRun> {
    (0..lines)
        .map(|i| run(BODY[i % BODY.len()], 72.0, top - i as f32 * 16.0, 10.0))
        .collect()
}

/// Two-page report: a 24pt title, 16pt sections, 10pt body.
pub fn report_pdf() -> Vec<u8> {
    let mut first = vec![run("Community Grants", 72.0, 720.0, 24.0).bold()];
    first.extend(body(680.0, 8));
    first.push(run("Eligibility", 72.0, 520.0, 16.0).bold());
    first.extend(body(495.0, 8));

    let mut second = vec![run("Assessment", 72.0, 720.0, 16.0).bold()];
    second.extend(body(695.0, 10));

    build_pdf(&[first, second])
}

pub fn write_pdf(path: &Path, data: &[u8]) {
    std::fs::write(path, data).unwrap();
}
