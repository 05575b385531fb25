// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF document handle — open, inspect, and rewrite page content and resources
// using the `lopdf` crate.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};
use typekeep_core::error::{Result, TypekeepError};

/// An opened PDF, exclusively owned by whoever is editing it.
///
/// Pages are addressed by 0-based index throughout.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

pub(crate) fn pdf_err(context: &str, err: impl std::fmt::Display) -> TypekeepError {
    TypekeepError::PdfError(format!("{context}: {err}"))
}

impl PdfDocument {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref)
            .map_err(|err| pdf_err(&format!("failed to open {}", path_ref.display()), err))?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: Some(path_ref.display().to_string()),
        })
    }

    /// Create a document from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| pdf_err("failed to load PDF from memory", err))?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    // -- Output ---------------------------------------------------------------

    /// Serialise the document.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| pdf_err("failed to serialise PDF", err))?;
        Ok(output)
    }

    /// Serialise the document to `path`.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!(bytes = bytes.len(), "PDF saved");
        Ok(())
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the document was created via [`PdfDocument::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Access the underlying lopdf document.
    pub fn inner(&self) -> &Document {
        &self.document
    }

    /// Object id of the page at 0-based `index`.
    pub fn page_id(&self, index: u32) -> Result<ObjectId> {
        // lopdf pages are keyed by 1-indexed page number.
        let pages = self.document.get_pages();
        pages.get(&(index + 1)).copied().ok_or_else(|| {
            TypekeepError::PdfError(format!(
                "page {} out of range (document has {} pages)",
                index,
                pages.len()
            ))
        })
    }

    /// Object ids of every page, in page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.get_pages().into_values().collect()
    }

    /// Resolve a possibly-indirect object.
    pub(crate) fn resolve<'a>(&'a self, object: &'a Object) -> Result<&'a Object> {
        match object {
            Object::Reference(id) => self
                .document
                .get_object(*id)
                .map_err(|err| pdf_err(&format!("cannot resolve {} {} R", id.0, id.1), err)),
            other => Ok(other),
        }
    }

    /// Resolve a possibly-indirect object that must be a dictionary.
    pub(crate) fn resolve_dict<'a>(&'a self, object: &'a Object) -> Result<&'a Dictionary> {
        match self.resolve(object)? {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&stream.dict),
            _ => Err(TypekeepError::PdfError(
                "expected a dictionary object".to_string(),
            )),
        }
    }

    fn page_dict(&self, page_id: ObjectId) -> Result<&Dictionary> {
        self.document
            .get_object(page_id)
            .and_then(|obj| obj.as_dict())
            .map_err(|err| pdf_err("failed to get page dictionary", err))
    }

    /// Look up `key` on the page, walking up the page tree via /Parent.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Result<Option<&Object>> {
        let mut current = page_id;
        // Bounded walk guards against /Parent cycles in damaged files.
        for _ in 0..64 {
            let dict = self.page_dict(current)?;
            if let Ok(value) = dict.get(key) {
                return Ok(Some(value));
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => current = *parent,
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    /// The page's effective /Resources dictionary (inherited if needed).
    pub fn page_resources(&self, page_id: ObjectId) -> Result<Dictionary> {
        match self.inherited(page_id, b"Resources")? {
            Some(obj) => Ok(self.resolve_dict(obj)?.clone()),
            None => Ok(Dictionary::new()),
        }
    }

    // -- Content --------------------------------------------------------------

    /// Decoded operators of the page's content, concatenated across all of its
    /// content streams.
    pub fn page_operations(&self, page_id: ObjectId) -> Result<Vec<Operation>> {
        let bytes = self
            .document
            .get_page_content(page_id)
            .map_err(|err| pdf_err("failed to read page content", err))?;
        let content =
            Content::decode(&bytes).map_err(|err| pdf_err("failed to decode page content", err))?;
        Ok(content.operations)
    }

    /// Replace the page's content with `operations`.
    ///
    /// The content is written to a fresh stream object referenced only by this
    /// page. Streams previously referenced by the page are left in place so
    /// pages sharing them are unaffected.
    #[instrument(skip(self, operations), fields(page = ?page_id, ops = operations.len()))]
    pub fn replace_page_operations(
        &mut self,
        page_id: ObjectId,
        operations: Vec<Operation>,
    ) -> Result<()> {
        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|err| pdf_err("failed to encode page content", err))?;
        let stream_id = self
            .document
            .add_object(Object::Stream(Stream::new(Dictionary::new(), encoded)));

        match self.document.get_object_mut(page_id) {
            Ok(Object::Dictionary(page)) => {
                page.set("Contents", Object::Reference(stream_id));
                debug!(stream = ?stream_id, "page content replaced");
                Ok(())
            }
            _ => Err(TypekeepError::PdfError(format!(
                "page object {} {} R is not a dictionary",
                page_id.0, page_id.1
            ))),
        }
    }

    // -- Resources ------------------------------------------------------------

    /// Give the page its own inline /Resources and /Font dictionaries, copied
    /// from the effective (possibly inherited or shared) ones, and return a
    /// mutable handle to the page's /Font dictionary.
    ///
    /// Font objects themselves stay shared; only the dictionaries naming them
    /// are copied.
    pub fn page_fonts_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary> {
        let mut resources = self.page_resources(page_id)?;
        let fonts = match resources.get(b"Font") {
            Ok(obj) => self.resolve_dict(obj)?.clone(),
            Err(_) => Dictionary::new(),
        };
        resources.set("Font", Object::Dictionary(fonts));

        let page = match self.document.get_object_mut(page_id) {
            Ok(Object::Dictionary(page)) => page,
            _ => {
                return Err(TypekeepError::PdfError(format!(
                    "page object {} {} R is not a dictionary",
                    page_id.0, page_id.1
                )));
            }
        };
        page.set("Resources", Object::Dictionary(resources));

        match page.get_mut(b"Resources").and_then(|r| r.as_dict_mut()) {
            Ok(res) => match res.get_mut(b"Font").and_then(|f| f.as_dict_mut()) {
                Ok(fonts) => Ok(fonts),
                Err(err) => Err(pdf_err("page /Font resources unavailable", err)),
            },
            Err(err) => Err(pdf_err("page /Resources unavailable", err)),
        }
    }

    /// Add a new indirect object.
    pub(crate) fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.document.add_object(object)
    }
}
