use std::fmt;
use std::str::FromStr;

use crate::binarize::BinarizedImage;
use crate::error::{PrintError, PrintResult};

/// Fixed horizontal resolution of the printer's raster protocol.
pub const PRINT_WIDTH: u32 = 384;

const CMD_SET_ENERGY: u8 = 0xA2;
const CMD_PRINT_REQUEST: u8 = 0xA9;
const CMD_FLUSH: u8 = 0xAD;

/// Thermal energy controlling print darkness.
/// 0x0000 is lightest, 0xFFFF (the default) darkest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Energy(u16);

impl Energy {
    pub const MAX: Energy = Energy(0xFFFF);

    pub fn new(value: u16) -> Self {
        Energy(value)
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl Default for Energy {
    fn default() -> Self {
        Energy::MAX
    }
}

impl FromStr for Energy {
    type Err = PrintError;

    /// Parses a hex energy value, with or without a `0x` prefix.
    /// Values that do not fit 16 bits are rejected before any printing
    /// is attempted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        match u32::from_str_radix(digits, 16) {
            Ok(v) if v <= 0xFFFF => Ok(Energy(v as u16)),
            _ => Err(PrintError::InvalidEnergy(s.to_string())),
        }
    }
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Computes CRC-8 (poly 0x07) for a byte slice.
pub fn crc8(data: &[u8]) -> u8 {
    let poly: u8 = 0x07;
    let mut crc: u8 = 0x00;

    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ poly;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Builds a control packet for the printer protocol.
///
/// Layout: `0x22 0x21` preamble, command byte, reserved zero,
/// little-endian payload length, payload, CRC-8 of the payload, `0xFF`.
///
/// - `command_id`: command byte
/// - `payload`: command payload
///
/// Returns the packet ready to send
pub fn build_control_packet(command_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + 1 + 1 + 2 + payload.len() + 1 + 1);
    out.push(0x22);
    out.push(0x21);
    out.push(command_id);
    out.push(0x00);
    let len = payload.len() as u16;
    out.push((len & 0xFF) as u8);
    out.push((len >> 8) as u8);
    out.extend_from_slice(payload);
    out.push(crc8(payload));
    out.push(0xFF);
    out
}

/// Packs a binarized buffer into the printer's 1-bpp row layout.
///
/// - rows top to bottom
/// - within each row, groups of 8 pixels become one byte where bit 0 is
///   the leftmost pixel of the group; a set bit prints black
pub fn pack_1bpp_rows(pixels: &[u8], width: u32, height: u32) -> PrintResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(PrintError::InvalidConfig("cannot pack an empty image".into()));
    }
    let required = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| PrintError::InvalidConfig("image dimensions overflow".into()))?;
    if pixels.len() < required {
        return Err(PrintError::InvalidConfig(format!(
            "pixel buffer holds {} bytes, {}x{} needs {}",
            pixels.len(),
            width,
            height,
            required
        )));
    }

    let width = width as usize;
    let bytes_per_row = width.div_ceil(8);
    let mut out = Vec::with_capacity(bytes_per_row * height as usize);
    for row in 0..height as usize {
        let row_off = row * width;
        for group in 0..bytes_per_row {
            let mut b: u8 = 0;
            let base = row_off + group * 8;
            let end = usize::min(base + 8, row_off + width);
            for (bit, px_idx) in (base..end).enumerate() {
                if pixels[px_idx] == 0 {
                    b |= 1 << bit;
                }
            }
            out.push(b);
        }
    }
    Ok(out)
}

/// Serializes a print job into the printer's command stream.
///
/// Deterministic, pure function of its inputs: energy packet, print
/// request (line count, 1-bpp mode), packed row data, flush packet.
///
/// - `image`: binarized image, `PRINT_WIDTH` pixels wide
/// - `energy`: darkness setting
///
/// Returns the full byte stream to transmit
pub fn encode_print_commands(image: &BinarizedImage, energy: Energy) -> PrintResult<Vec<u8>> {
    let height = image.height();
    if height > u16::MAX as u32 {
        return Err(PrintError::InvalidConfig(format!(
            "image height {} exceeds the protocol's 16-bit line count",
            height
        )));
    }
    let rows = pack_1bpp_rows(image.as_raw(), image.width(), height)?;

    let mut out = build_control_packet(CMD_SET_ENERGY, &energy.value().to_le_bytes());

    let line_count = height as u16;
    let mut request = Vec::with_capacity(4);
    request.extend_from_slice(&line_count.to_le_bytes());
    request.push(0x30);
    request.push(0x00); // mode 0 = 1bpp
    out.extend_from_slice(&build_control_packet(CMD_PRINT_REQUEST, &request));

    out.extend_from_slice(&rows);
    out.extend_from_slice(&build_control_packet(CMD_FLUSH, &[0x00]));
    Ok(out)
}

/// Splits data into transmit-sized chunks.
pub fn chunk_data(data: &[u8], chunk_size: usize) -> Vec<&[u8]> {
    if chunk_size == 0 {
        return vec![data];
    }
    data.chunks(chunk_size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn crc8_known_values() {
        assert_eq!(crc8(&[]), 0x00);
        assert_eq!(crc8(&[0x01]), 0x07);
        assert_eq!(crc8(&[0x00, 0x00]), 0x00);
    }

    #[test]
    fn control_packet_layout() {
        let packet = build_control_packet(0xA9, &[1, 2, 3]);
        assert_eq!(&packet[..2], &[0x22, 0x21]);
        assert_eq!(packet[2], 0xA9);
        assert_eq!(packet[3], 0x00);
        assert_eq!(&packet[4..6], &[0x03, 0x00]);
        assert_eq!(&packet[6..9], &[1, 2, 3]);
        assert_eq!(packet[9], crc8(&[1, 2, 3]));
        assert_eq!(packet[10], 0xFF);
    }

    #[test]
    fn packing_sets_lsb_for_leftmost_black_pixel() {
        // 10 px row: first pixel black, rest white
        let mut pixels = vec![255u8; 10];
        pixels[0] = 0;
        let packed = pack_1bpp_rows(&pixels, 10, 1).unwrap();
        assert_eq!(packed, vec![0x01, 0x00]);
    }

    #[test]
    fn packing_all_black_row() {
        let pixels = vec![0u8; 8];
        let packed = pack_1bpp_rows(&pixels, 8, 1).unwrap();
        assert_eq!(packed, vec![0xFF]);
    }

    #[test]
    fn packing_rejects_short_buffer() {
        assert!(pack_1bpp_rows(&[0u8; 4], 8, 1).is_err());
        assert!(pack_1bpp_rows(&[], 0, 1).is_err());
    }

    #[test]
    fn energy_parses_hex_with_and_without_prefix() {
        assert_eq!("0xffff".parse::<Energy>().unwrap(), Energy::MAX);
        assert_eq!("8000".parse::<Energy>().unwrap(), Energy::new(0x8000));
        assert_eq!(Energy::default(), Energy::MAX);
    }

    #[test]
    fn out_of_range_energy_is_rejected() {
        let err = "0x10000".parse::<Energy>().unwrap_err();
        assert!(matches!(err, crate::error::PrintError::InvalidEnergy(_)));
        assert!("bogus".parse::<Energy>().is_err());
    }

    #[test]
    fn encoded_stream_is_deterministic_and_framed() {
        let img = crate::binarize::BinarizedImage::new(GrayImage::from_pixel(
            PRINT_WIDTH,
            2,
            Luma([0]),
        ));
        let a = encode_print_commands(&img, Energy::new(0x3000)).unwrap();
        let b = encode_print_commands(&img, Energy::new(0x3000)).unwrap();
        assert_eq!(a, b);
        // energy packet leads the stream with the LE value
        assert_eq!(&a[..3], &[0x22, 0x21, CMD_SET_ENERGY]);
        assert_eq!(&a[6..8], &[0x00, 0x30]);
        // flush packet terminates it
        assert_eq!(a[a.len() - 1], 0xFF);
        let flush = build_control_packet(CMD_FLUSH, &[0x00]);
        assert_eq!(&a[a.len() - flush.len()..], &flush[..]);
    }
}
