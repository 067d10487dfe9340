use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{DynamicImage, Rgba};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use std::io::Write;

/// PDF points per CSS pixel (72 / 96).
pub const POINTS_PER_PIXEL: f32 = 0.75;

/// Sample planes of a decoded image, as PDF image streams expect them.
struct Planes {
    /// 8, or 16 for images deeper than 8 bits per channel.
    bits: i64,
    /// Interleaved RGB samples, big-endian when 16 bits wide.
    color: Vec<u8>,
    /// Alpha samples, only when at least one pixel is not fully opaque.
    alpha: Option<Vec<u8>>,
}

impl Planes {
    fn of(image: &DynamicImage) -> Self {
        let kind = image.color();
        let mut color = Vec::new();
        let mut alpha = Vec::new();
        let bits = if kind.bytes_per_pixel() > kind.channel_count() {
            for &Rgba([r, g, b, a]) in image.to_rgba16().pixels() {
                for sample in [r, g, b] {
                    color.extend(sample.to_be_bytes());
                }
                alpha.extend(a.to_be_bytes());
            }
            16
        } else {
            for &Rgba([r, g, b, a]) in image.to_rgba8().pixels() {
                color.extend([r, g, b]);
                alpha.push(a);
            }
            8
        };
        let alpha = Some(alpha).filter(|alpha| kind.has_alpha() && alpha.iter().any(|&sample| sample != u8::MAX));
        Self { bits, color, alpha }
    }
}

fn deflate(samples: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(samples).or_raise(|| ErrorKind::Encode)?;
    Ok(encoder.finish().or_raise(|| ErrorKind::Encode)?)
}

fn image_object(width: u32, height: u32, color_space: &str, bits: i64, samples: &[u8]) -> Result<Stream> {
    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(i64::from(width)),
            "Height" => Object::Integer(i64::from(height)),
            "ColorSpace" => color_space,
            "BitsPerComponent" => Object::Integer(bits),
            "Filter" => "FlateDecode",
        },
        deflate(samples)?,
    ))
}

/// Wrap one raster capture into a single-page document of the same aspect.
///
/// The image is stored losslessly and scaled to fill the whole page: Flate
/// compressed RGB at the source's bit depth (8 or 16), with transparency
/// kept as a soft mask.
pub fn wrap_raster(step: u64, bytes: &[u8]) -> Result<Document> {
    let image = image::load_from_memory(bytes).or_raise(|| ErrorKind::InvalidImage(step))?;
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        exn::bail!(ErrorKind::InvalidImage(step));
    }
    let planes = Planes::of(&image);

    let page_width = width as f32 * POINTS_PER_PIXEL;
    let page_height = height as f32 * POINTS_PER_PIXEL;

    let mut doc = Document::with_version("1.5");
    let mut color = image_object(width, height, "DeviceRGB", planes.bits, &planes.color)?;
    if let Some(alpha) = &planes.alpha {
        let mask_id = doc.add_object(image_object(width, height, "DeviceGray", planes.bits, alpha)?);
        color.dict.set("SMask", mask_id);
    }
    let image_id = doc.add_object(color);
    let content = format!("q {page_width} 0 0 {page_height} 0 0 cm /Im0 Do Q");
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Real(page_width), Object::Real(page_height)],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage, RgbaImage};
    use rstest::rstest;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::new(width, height).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[rstest]
    #[case::landscape(1280, 720, 960.0, 540.0)]
    #[case::portrait(600, 800, 450.0, 600.0)]
    #[case::tiny(4, 4, 3.0, 3.0)]
    fn page_matches_image_geometry(#[case] width: u32, #[case] height: u32, #[case] points_w: f32, #[case] points_h: f32) {
        let doc = wrap_raster(0, &png(width, height)).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page = doc.get_dictionary(pages[&1]).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_float().unwrap(), points_w);
        assert_eq!(media_box[3].as_float().unwrap(), points_h);
    }

    fn encode(image: DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    /// The page's image XObject and its decoded samples.
    fn image_of(doc: &Document) -> (Dictionary, Vec<u8>) {
        let page = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let id = resources.get(b"XObject").unwrap().as_dict().unwrap().get(b"Im0").unwrap().as_reference().unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        (stream.dict.clone(), stream.decompressed_content().unwrap())
    }

    #[test]
    fn transparency_becomes_a_soft_mask() {
        let mut pixels = RgbaImage::from_pixel(2, 1, image::Rgba([10, 20, 30, 255]));
        pixels.put_pixel(1, 0, image::Rgba([40, 50, 60, 0]));
        let doc = wrap_raster(0, &encode(DynamicImage::ImageRgba8(pixels))).unwrap();

        let (dict, samples) = image_of(&doc);
        assert_eq!(samples, vec![10, 20, 30, 40, 50, 60]);
        let mask = doc.get_object(dict.get(b"SMask").unwrap().as_reference().unwrap()).unwrap().as_stream().unwrap();
        assert_eq!(mask.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
        assert_eq!(mask.decompressed_content().unwrap(), vec![255, 0]);
    }

    #[test]
    fn opaque_alpha_needs_no_mask() {
        let pixels = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let (dict, _) = image_of(&wrap_raster(0, &encode(DynamicImage::ImageRgba8(pixels))).unwrap());
        assert!(!dict.has(b"SMask"));
        assert_eq!(dict.get(b"BitsPerComponent").unwrap().as_i64().unwrap(), 8);
    }

    #[test]
    fn sixteen_bit_depth_is_kept() {
        let pixels: ImageBuffer<Rgb<u16>, Vec<u16>> = ImageBuffer::from_pixel(1, 1, Rgb([0x0102, 0x0304, 0xfffe]));
        let (dict, samples) = image_of(&wrap_raster(0, &encode(DynamicImage::ImageRgb16(pixels))).unwrap());
        assert_eq!(dict.get(b"BitsPerComponent").unwrap().as_i64().unwrap(), 16);
        assert_eq!(samples, vec![0x01, 0x02, 0x03, 0x04, 0xff, 0xfe]);
        assert!(!dict.has(b"SMask"));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = wrap_raster(7, b"definitely not a png").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidImage(7)));
    }
}
