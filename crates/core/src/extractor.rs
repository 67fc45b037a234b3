use crate::error::IngestError;
use crate::models::{BlockKind, ContentBlock};
use crate::ocr::OcrEngine;
use crate::tables::{detect_tables, format_table_content, parse_table};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::warn;

/// Turns a raw PDF byte stream into an ordered sequence of typed content
/// blocks. A failure to open the stream at all is the `Err` arm; every
/// page- or block-level failure is absorbed into the block sequence.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<Vec<ContentBlock>, IngestError>;
}

/// lopdf-based extractor with three independent per-page passes: text
/// blocks, tabular regions, and embedded raster images routed through OCR.
pub struct LopdfExtractor<O: OcrEngine> {
    ocr: O,
}

impl<O: OcrEngine> LopdfExtractor<O> {
    pub fn new(ocr: O) -> Self {
        Self { ocr }
    }
}

impl Default for LopdfExtractor<crate::ocr::TesseractOcr> {
    fn default() -> Self {
        Self::new(crate::ocr::TesseractOcr::default())
    }
}

impl<O: OcrEngine> ContentExtractor for LopdfExtractor<O> {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<Vec<ContentBlock>, IngestError> {
        let document =
            Document::load_mem(pdf_bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut blocks = Vec::new();

        for (page_no, page_id) in document.get_pages() {
            // lopdf numbers pages from 1; emitted page numbers are zero-based.
            let page_number = page_no.saturating_sub(1);

            match document.extract_text(&[page_no]) {
                Ok(page_text) => {
                    blocks.extend(page_content_blocks(page_number, &page_text));
                }
                Err(error) => {
                    warn!(page = page_number, %error, "page text extraction failed");
                }
            }

            blocks.extend(self.page_image_blocks(&document, page_id, page_number));
        }

        Ok(blocks)
    }
}

impl<O: OcrEngine> LopdfExtractor<O> {
    fn page_image_blocks(
        &self,
        document: &Document,
        page_id: ObjectId,
        page_number: u32,
    ) -> Vec<ContentBlock> {
        let mut blocks = Vec::new();
        let mut image_index = 0u32;

        for xobject_id in page_xobject_ids(document, page_id) {
            let stream = match document
                .get_object(xobject_id)
                .and_then(|object| object.as_stream())
            {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(page = page_number, %error, "unreadable xobject");
                    continue;
                }
            };

            if !is_image_stream(stream) {
                continue;
            }

            let block_index = image_index;
            image_index += 1;

            let encoded = match encoded_image_bytes(stream) {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(
                        page = page_number,
                        image = block_index,
                        %error,
                        "image decode failed, dropping block"
                    );
                    continue;
                }
            };

            match self.ocr.recognize(&encoded) {
                Ok(text) => {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        blocks.push(ContentBlock::new(
                            BlockKind::Image,
                            page_number,
                            block_index,
                            text,
                        ));
                    }
                }
                Err(error) => {
                    warn!(
                        page = page_number,
                        image = block_index,
                        %error,
                        "ocr failed, dropping block"
                    );
                }
            }
        }

        blocks
    }
}

/// Text and table passes over one page's extracted text. Both passes see
/// the full text independently; tabular lines are also part of the text
/// blocks they fall in, mirroring how layout extractors report them.
fn page_content_blocks(page_number: u32, page_text: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let normalized = page_text.replace("\r\n", "\n");

    for (index, segment) in normalized.split("\n\n").enumerate() {
        let content = segment.trim();
        if !content.is_empty() {
            blocks.push(ContentBlock::new(
                BlockKind::Text,
                page_number,
                index as u32,
                content.to_string(),
            ));
        }
    }

    for (index, region) in detect_tables(&normalized).iter().enumerate() {
        match parse_table(region) {
            Ok(rows) => {
                let content = format_table_content(&rows);
                if !content.is_empty() {
                    blocks.push(ContentBlock::new(
                        BlockKind::Table,
                        page_number,
                        index as u32,
                        content,
                    ));
                }
            }
            Err(error) => {
                warn!(page = page_number, table = index, %error, "table parse failed");
                blocks.push(ContentBlock::failed(
                    BlockKind::Table,
                    page_number,
                    index as u32,
                    format!("Failed to extract table: {error}"),
                ));
            }
        }
    }

    blocks
}

fn page_xobject_ids(document: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut ids = Vec::new();
    let (resources, resource_ids) = document.get_page_resources(page_id);

    if let Some(resources) = resources {
        collect_xobject_ids(resources, &mut ids);
    }

    for resource_id in resource_ids {
        if let Ok(resources) = document
            .get_object(resource_id)
            .and_then(|object| object.as_dict())
        {
            collect_xobject_ids(resources, &mut ids);
        }
    }

    ids
}

fn collect_xobject_ids(resources: &Dictionary, ids: &mut Vec<ObjectId>) {
    let Ok(xobjects) = resources.get(b"XObject").and_then(|object| object.as_dict()) else {
        return;
    };

    for (_name, entry) in xobjects.iter() {
        if let Ok(id) = entry.as_reference() {
            ids.push(id);
        }
    }
}

fn is_image_stream(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .and_then(|object| object.as_name())
        .map(|name| name == b"Image")
        .unwrap_or(false)
}

fn stream_filters(stream: &Stream) -> Vec<Vec<u8>> {
    let mut filters = Vec::new();

    if let Ok(filter) = stream.dict.get(b"Filter") {
        match filter {
            Object::Name(name) => filters.push(name.clone()),
            Object::Array(entries) => {
                for entry in entries {
                    if let Ok(name) = entry.as_name() {
                        filters.push(name.to_vec());
                    }
                }
            }
            _ => {}
        }
    }

    filters
}

/// Recovers bytes in a format an OCR engine can read. JPEG payloads pass
/// through untouched; raw sample streams are rebuilt into a PNG.
fn encoded_image_bytes(stream: &Stream) -> Result<Vec<u8>, String> {
    let filters = stream_filters(stream);

    // DCTDecode streams are standalone JPEG files.
    if filters.iter().any(|name| name == b"DCTDecode") {
        return Ok(stream.content.clone());
    }

    let samples = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let width = dict_u32(&stream.dict, b"Width")?;
    let height = dict_u32(&stream.dict, b"Height")?;
    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .and_then(|object| object.as_i64())
        .unwrap_or(8);

    if bits != 8 {
        return Err(format!("unsupported bits per component: {bits}"));
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .and_then(|object| object.as_name())
        .map(|name| name.to_vec())
        .unwrap_or_else(|_| b"DeviceGray".to_vec());

    let dynamic = match color_space.as_slice() {
        b"DeviceRGB" => image::RgbImage::from_raw(width, height, samples)
            .map(image::DynamicImage::ImageRgb8)
            .ok_or_else(|| "rgb sample buffer too short".to_string())?,
        b"DeviceGray" => image::GrayImage::from_raw(width, height, samples)
            .map(image::DynamicImage::ImageLuma8)
            .ok_or_else(|| "gray sample buffer too short".to_string())?,
        other => {
            return Err(format!(
                "unsupported color space: {}",
                String::from_utf8_lossy(other)
            ));
        }
    };

    let mut png = Vec::new();
    dynamic
        .write_to(
            &mut std::io::Cursor::new(&mut png),
            image::ImageOutputFormat::Png,
        )
        .map_err(|error| error.to_string())?;

    Ok(png)
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Result<u32, String> {
    dict.get(key)
        .and_then(|object| object.as_i64())
        .map(|value| value as u32)
        .map_err(|error| format!("missing {}: {error}", String::from_utf8_lossy(key)))
}

#[cfg(test)]
mod tests {
    use super::{page_content_blocks, ContentExtractor, LopdfExtractor};
    use crate::models::BlockKind;
    use crate::ocr::{OcrEngine, OcrError};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenOcr;

    impl OcrEngine for BrokenOcr {
        fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
            Err(OcrError("engine unavailable".to_string()))
        }
    }

    fn text_page_content(text: &str) -> Vec<u8> {
        Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        }
        .encode()
        .unwrap()
    }

    /// Builds a minimal PDF with one text line per page and an optional
    /// grayscale image on the first page.
    fn build_pdf(page_texts: &[&str], with_image: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut kids = Vec::new();
        for (index, text) in page_texts.iter().enumerate() {
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, text_page_content(text)));

            let mut resources = dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            };

            if with_image && index == 0 {
                let image_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => 2,
                        "Height" => 2,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    vec![0u8, 64, 128, 255],
                ));
                resources.set("XObject", dictionary! { "Im1" => image_id });
            }

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = page_texts.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn unparseable_bytes_are_a_fatal_error() {
        let extractor = LopdfExtractor::new(FixedOcr(""));
        let result = extractor.extract(b"not a pdf at all");
        assert!(result.is_err());
    }

    #[test]
    fn two_pages_with_one_text_block_each() {
        let bytes = build_pdf(&["First page body", "Second page body"], false);
        let extractor = LopdfExtractor::new(FixedOcr(""));
        let blocks = extractor.extract(&bytes).unwrap();

        assert_eq!(blocks.len(), 2);
        for (page, block) in blocks.iter().enumerate() {
            assert_eq!(block.kind, BlockKind::Text);
            assert_eq!(block.page_number, page as u32);
            assert_eq!(block.block_index, 0);
            assert!(block.error.is_none());
        }
        assert!(blocks[0].content.contains("First page body"));
        assert!(blocks[1].content.contains("Second page body"));
    }

    #[test]
    fn image_block_is_emitted_when_ocr_finds_text() {
        let bytes = build_pdf(&["Body text"], true);
        let extractor = LopdfExtractor::new(FixedOcr("  SCANNED CAPTION  "));
        let blocks = extractor.extract(&bytes).unwrap();

        let image_blocks: Vec<_> = blocks
            .iter()
            .filter(|block| block.kind == BlockKind::Image)
            .collect();
        assert_eq!(image_blocks.len(), 1);
        assert_eq!(image_blocks[0].content, "SCANNED CAPTION");
        assert_eq!(image_blocks[0].block_index, 0);
        assert_eq!(image_blocks[0].page_number, 0);
    }

    #[test]
    fn image_block_is_dropped_when_ocr_text_is_empty() {
        let bytes = build_pdf(&["Body text"], true);
        let extractor = LopdfExtractor::new(FixedOcr("   "));
        let blocks = extractor.extract(&bytes).unwrap();
        assert!(blocks.iter().all(|block| block.kind != BlockKind::Image));
    }

    #[test]
    fn ocr_failure_drops_the_block_without_aborting() {
        let bytes = build_pdf(&["Body text"], true);
        let extractor = LopdfExtractor::new(BrokenOcr);
        let blocks = extractor.extract(&bytes).unwrap();

        assert!(blocks.iter().all(|block| block.kind != BlockKind::Image));
        assert!(blocks.iter().any(|block| block.kind == BlockKind::Text));
    }

    #[test]
    fn text_and_table_indexes_are_scoped_independently() {
        let page = "Quarterly summary\n\nRegion  Revenue\nNorth  120\nSouth  90";
        let blocks = page_content_blocks(0, page);

        let first_text = blocks
            .iter()
            .find(|block| block.kind == BlockKind::Text)
            .unwrap();
        let first_table = blocks
            .iter()
            .find(|block| block.kind == BlockKind::Table)
            .unwrap();

        assert_eq!(first_text.block_index, 0);
        assert_eq!(first_table.block_index, 0);
        assert_eq!(
            first_table.content,
            "Headers: Region, Revenue. Row 1: North, 120. Row 2: South, 90."
        );
    }

    #[test]
    fn ragged_table_becomes_an_error_block() {
        let page = "a  b  c\n1  2";
        let blocks = page_content_blocks(0, page);

        let table = blocks
            .iter()
            .find(|block| block.kind == BlockKind::Table)
            .unwrap();
        assert!(table.content.is_empty());
        assert!(table.error.as_deref().unwrap().contains("Failed to extract table"));
    }

    #[test]
    fn whitespace_only_segments_are_never_emitted() {
        let blocks = page_content_blocks(3, "  \n\n   \n\nActual text");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "Actual text");
        assert_eq!(blocks[0].page_number, 3);
        // the empty leading segments still consumed indexes 0 and 1
        assert_eq!(blocks[0].block_index, 2);
    }
}
