//! Technical-sheet PDF rendering.
//!
//! One A4 page per product: a bold title with the product code, the name and
//! price lines, and the product raster embedded at a fixed position. Layout
//! coordinates are expressed in points from the bottom-left corner and
//! converted to millimeters for the PDF writer.

use std::io::BufWriter;

use image::DynamicImage;
use printpdf::{BuiltinFont, ImageTransform, Mm, PdfDocument};

use crate::error::ProductError;

const PT_TO_MM: f32 = 0.352_778;
const A4_WIDTH_MM: f32 = 210.0;
const A4_HEIGHT_MM: f32 = 297.0;

/// Embedded raster resolution. Together with the scale factors this pins the
/// image to a 350x350pt box regardless of its pixel dimensions.
const IMAGE_DPI: f32 = 300.0;
const IMAGE_BOX_PT: f32 = 350.0;
const IMAGE_POS_PT: (f32, f32) = (50.0, 400.0);

const TITLE_POS_PT: (f32, f32) = (50.0, 800.0);
const NAME_POS_PT: (f32, f32) = (50.0, 770.0);
const PRICE_POS_PT: (f32, f32) = (50.0, 750.0);

fn mm(pt: f32) -> Mm {
    Mm(pt * PT_TO_MM)
}

/// Render the technical sheet for one product and return the PDF bytes.
///
/// The raster is flattened over a white background before embedding, since
/// the catalog payloads carry transparency that the PDF image XObject does
/// not.
pub fn render_sheet(
    code: &str,
    name: &str,
    price: &str,
    raster: &DynamicImage,
) -> Result<Vec<u8>, ProductError> {
    let fail = |detail: String| ProductError::SheetFailed {
        code: code.to_string(),
        detail,
    };

    let (doc, page, layer) = PdfDocument::new(
        format!("Ficha Técnica – {code}"),
        Mm(A4_WIDTH_MM),
        Mm(A4_HEIGHT_MM),
        "Layer 1",
    );
    let layer = doc.get_page(page).get_layer(layer);

    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| fail(e.to_string()))?;
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| fail(e.to_string()))?;

    layer.use_text(
        format!("Ficha Técnica – {code}"),
        18.0,
        mm(TITLE_POS_PT.0),
        mm(TITLE_POS_PT.1),
        &bold,
    );
    layer.use_text(
        format!("Nombre: {name}"),
        14.0,
        mm(NAME_POS_PT.0),
        mm(NAME_POS_PT.1),
        &regular,
    );
    layer.use_text(
        format!("Precio: {price}"),
        14.0,
        mm(PRICE_POS_PT.0),
        mm(PRICE_POS_PT.1),
        &regular,
    );

    let flat = flatten_over_white(raster);
    let (width, height) = (flat.width(), flat.height());
    let embedded = printpdf::image_crate::RgbImage::from_raw(width, height, flat.into_raw())
        .ok_or_else(|| fail("raster buffer size mismatch".to_string()))?;
    let pdf_image =
        printpdf::Image::from_dynamic_image(&printpdf::image_crate::DynamicImage::ImageRgb8(
            embedded,
        ));

    // Native size at IMAGE_DPI in millimeters, used to derive the scale that
    // fits the 350pt box.
    let native_w_mm = width as f32 / IMAGE_DPI * 25.4;
    let native_h_mm = height as f32 / IMAGE_DPI * 25.4;
    let box_mm = IMAGE_BOX_PT * PT_TO_MM;
    pdf_image.add_to_layer(
        layer,
        ImageTransform {
            translate_x: Some(mm(IMAGE_POS_PT.0)),
            translate_y: Some(mm(IMAGE_POS_PT.1)),
            scale_x: Some(box_mm / native_w_mm),
            scale_y: Some(box_mm / native_h_mm),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    );

    let mut out = BufWriter::new(Vec::new());
    doc.save(&mut out).map_err(|e| fail(e.to_string()))?;
    out.into_inner().map_err(|e| fail(e.to_string()))
}

fn flatten_over_white(raster: &DynamicImage) -> image::RgbImage {
    let src = raster.to_rgba8();
    let mut flat = image::RgbImage::new(src.width(), src.height());
    for (x, y, p) in src.enumerate_pixels() {
        let a = u32::from(p[3]);
        let blend = |c: u8| -> u8 { ((u32::from(c) * a + 255 * (255 - a)) / 255) as u8 };
        flat.put_pixel(x, y, image::Rgb([blend(p[0]), blend(p[1]), blend(p[2])]));
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn raster() -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(8, 8, Rgba([30, 60, 90, 255])))
    }

    #[test]
    fn produces_a_pdf_document() {
        let bytes = render_sheet("A1", "Widget", "9.99", &raster()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn flattening_blends_transparency_to_white() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            2,
            2,
            Rgba([0, 0, 0, 0]),
        ));
        let flat = flatten_over_white(&img);
        assert_eq!(flat.get_pixel(0, 0), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn distinct_products_render_distinct_documents() {
        let a = render_sheet("A1", "Widget", "9.99", &raster()).unwrap();
        let b = render_sheet("B2", "Gadget", "12.50", &raster()).unwrap();
        assert_ne!(a, b);
    }
}
