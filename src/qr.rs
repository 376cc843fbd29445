use crate::{
    data::student::Student,
    error::{
        BadIdFieldSnafu, EncodeImageSnafu, NoIdFieldSnafu, RenderQrSnafu, RosterError,
        RosterResult, UnreadableSnafu,
    },
};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use snafu::{OptionExt, ResultExt};
use std::{collections::HashMap, io::Cursor};

const MODULE_PIXELS: u32 = 10;

/// The text stored inside a student's QR code. Field order is fixed: `id`, `first_name`,
/// `last_name`, `department`, `email`.
pub fn payload_for(student: &Student) -> String {
    format!(
        "id:{},first_name:{},last_name:{},department:{},email:{}",
        student.id, student.first_name, student.last_name, student.department, student.email
    )
}

pub fn render_png(payload: &str) -> RosterResult<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes()).context(RenderQrSnafu)?;
    let image = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
        .build();

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context(EncodeImageSnafu)?;
    Ok(bytes)
}

pub fn encode(student: &Student) -> RosterResult<Vec<u8>> {
    render_png(&payload_for(student))
}

/// Pulls the text out of the first readable QR code in the image. Any format `image` can
/// sniff is accepted, phone photos are usually JPEG.
pub fn scan_image(image_bytes: &[u8]) -> RosterResult<String> {
    let image = match image::load_from_memory(image_bytes) {
        Ok(image) => image.to_luma8(),
        Err(e) => {
            debug!(?e, "Uploaded QR image could not be loaded");
            return UnreadableSnafu.fail();
        }
    };

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        image.width() as usize,
        image.height() as usize,
        |x, y| image.get_pixel(x as u32, y as u32).0[0],
    );

    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                debug!(?e, "Found a QR grid but could not decode it");
                None
            }
        })
        .filter(|content| !content.is_empty())
        .context(UnreadableSnafu)
}

/// Splits `key:value,key:value` into a map. Pairs without a `:` are ignored, values keep any
/// further `:` they contain.
pub fn parse_payload(payload: &str) -> RosterResult<HashMap<String, String>> {
    let fields: HashMap<String, String> = payload
        .split(',')
        .filter_map(|part| part.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    if fields.contains_key("id") {
        Ok(fields)
    } else {
        NoIdFieldSnafu.fail()
    }
}

pub fn decode(image_bytes: &[u8]) -> RosterResult<HashMap<String, String>> {
    parse_payload(&scan_image(image_bytes)?)
}

pub fn student_id(fields: &HashMap<String, String>) -> RosterResult<i64> {
    let value = fields.get("id").ok_or(RosterError::NoIdField)?;
    value.parse().context(BadIdFieldSnafu {
        value: value.clone(),
    })
}
