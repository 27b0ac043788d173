//! Encoded polyline format
//!
//! Valhalla encodes shapes with 6 decimal places (vs 5 for Google), same
//! algorithm otherwise.

use anyhow::Result;

use crate::types::Coordinates;

/// Precision used for every polyline this worker produces.
pub const ROUTE_PRECISION: u32 = 6;

/// Decode an encoded polyline into coordinates.
pub fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<Coordinates>> {
    let factor = 10_f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut coordinates = Vec::new();
    let mut lat = 0i64;
    let mut lng = 0i64;
    let mut i = 0;

    while i < bytes.len() {
        lat = accumulate(lat, next_value(bytes, &mut i)?)?;
        lng = accumulate(lng, next_value(bytes, &mut i)?)?;
        coordinates.push(Coordinates {
            lat: lat as f64 / factor,
            lng: lng as f64 / factor,
        });
    }

    Ok(coordinates)
}

/// Encode coordinates as a polyline.
pub fn encode_polyline(coordinates: &[Coordinates], precision: u32) -> String {
    let factor = 10_f64.powi(precision as i32);
    let mut out = String::with_capacity(coordinates.len() * 8);
    let mut prev_lat = 0i64;
    let mut prev_lng = 0i64;

    for point in coordinates {
        let lat = (point.lat * factor).round() as i64;
        let lng = (point.lng * factor).round() as i64;
        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lng - prev_lng);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn next_value(bytes: &[u8], i: &mut usize) -> Result<i64> {
    let mut shift = 0;
    let mut result = 0i64;
    loop {
        if *i >= bytes.len() {
            anyhow::bail!("Invalid polyline encoding: truncated value");
        }
        let byte = bytes[*i] as i64 - 63;
        *i += 1;
        if !(0..64).contains(&byte) || shift > 60 {
            anyhow::bail!("Invalid polyline encoding at byte {}", *i - 1);
        }
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }

    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

fn accumulate(total: i64, delta: i64) -> Result<i64> {
    total
        .checked_add(delta)
        .ok_or_else(|| anyhow::anyhow!("Invalid polyline encoding: coordinate overflow"))
}

fn push_value(out: &mut String, value: i64) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((((v & 0x1f) | 0x20) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}
