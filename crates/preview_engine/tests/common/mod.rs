#![allow(dead_code)]

use std::sync::Once;

use lopdf::{dictionary, Document, Object, Stream};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(preview_logging::initialize_for_tests);
}

/// In-memory PDF with `count` 4x6in pages.
pub fn label_pdf(count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..count)
        .map(|index| {
            let content = format!("BT /F1 12 Tf 20 20 Td (label {}) Tj ET", index + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            }))
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
            "MediaBox" => vec![0.into(), 0.into(), 288.into(), 432.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
