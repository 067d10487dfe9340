use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"Resources", b"CropBox", b"Rotate"];
/// Page trees deeper than this are treated as malformed.
const MAX_TREE_DEPTH: usize = 64;

/// Concatenate the pages of `documents`, in order, into one document.
///
/// Only pages and the objects they reference survive; each source document's
/// catalog and page tree are replaced, so inheritable attributes are copied
/// onto every page first.
pub fn merge(documents: Vec<Document>) -> Result<Vec<u8>> {
    if documents.is_empty() {
        exn::bail!(ErrorKind::Empty);
    }

    let mut merged = Document::with_version("1.5");
    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in &page_ids {
            let Ok(page) = doc.get_dictionary(*page_id) else {
                tracing::warn!(?page_id, "Skipping page that is not a dictionary");
                continue;
            };
            let mut page = page.clone();
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Some(value) = inherited(&doc, &page, key) {
                        page.set(key, value);
                    }
                }
            }
            pages.push((*page_id, page));
        }

        for (id, object) in doc.objects {
            if page_ids.contains(&id) {
                continue;
            }
            match object.type_name().unwrap_or_default() {
                b"Catalog" | b"Pages" | b"Outlines" | b"Outline" => {},
                _ => {
                    merged.objects.insert(id, object);
                },
            }
        }
    }

    let pages_id = (max_id, 0);
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let count = kids.len();
    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(id, Object::Dictionary(page));
    }
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count as i64),
        }),
    );
    let catalog_id = (max_id + 1, 0);
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    merged.trailer.set("Root", catalog_id);
    merged.max_id = max_id + 1;
    merged.renumber_objects();
    merged.compress();

    let mut bytes = Vec::new();
    merged.save_to(&mut bytes).or_raise(|| ErrorKind::Encode)?;
    tracing::debug!(pages = count, bytes = bytes.len(), "Merged document");
    Ok(bytes)
}

/// Walk up the page tree looking for an inherited attribute.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
    }
    None
}
